use std::time::Duration;

use portal_fetch::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve canned JSON responses on a loopback port. `route` maps a request
/// target (path + query) to a status code and body. Targets under `/slow`
/// stall for two seconds before the reply.
async fn serve(route: fn(&str) -> (u16, String)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                if target.starts_with("/slow") {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                let (status, body) = route(&target);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

fn listing(target: &str) -> (u16, String) {
    if target.starts_with("/broken") {
        return (503, "{}".to_string());
    }
    if target.starts_with("/garbage") {
        return (200, "<html>".to_string());
    }
    match target.split("page=").nth(1) {
        None => (
            200,
            r#"{"info":{"count":3,"pages":2,"next":null,"prev":null},"results":[]}"#.to_string(),
        ),
        Some("1") => (200, r#"{"results":[{"id":1},{"id":2}]}"#.to_string()),
        Some("2") => (200, r#"{"results":[{"id":3}]}"#.to_string()),
        Some(_) => (404, r#"{"error":"There is nothing here"}"#.to_string()),
    }
}

fn fetcher() -> PagedFetcher<HttpSource> {
    let options = FetchOptions {
        max_concurrent_requests: 2,
        retry: RetryPolicy::immediate(2),
    };
    PagedFetcher::new(HttpSource::new(Duration::from_secs(5)).unwrap(), options)
}

#[tokio::test]
async fn fetches_all_pages_over_http() {
    let base = serve(listing).await;
    let url = format!("{base}/api/location");

    let fetcher = fetcher();
    assert_eq!(fetcher.get_total_pages(&url).await, 2);

    let report = fetcher.fetch_all(&url).await;
    let ids: Vec<i64> = report
        .records
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(report.is_complete());
}

#[tokio::test]
async fn non_200_status_is_transient() {
    let base = serve(listing).await;
    let source = HttpSource::new(Duration::from_secs(5)).unwrap();

    let err = source
        .fetch_listing(&format!("{base}/broken"), Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert!(err.is_transient());

    let err = source
        .fetch_listing(&format!("{base}/api/location"), Some(9))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn undecodable_body_is_permanent() {
    let base = serve(listing).await;
    let source = HttpSource::new(Duration::from_secs(5)).unwrap();

    let err = source
        .fetch_listing(&format!("{base}/garbage"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
    assert!(!err.is_transient());

    assert_eq!(fetcher().get_total_pages(&format!("{base}/garbage")).await, 0);
}

#[tokio::test]
async fn slow_response_times_out() {
    let base = serve(listing).await;
    let timeout = Duration::from_millis(100);
    let source = HttpSource::new(timeout).unwrap();

    let err = source
        .fetch_listing(&format!("{base}/slow/location"), Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(t) if t == timeout));
    assert!(err.is_transient());
}
