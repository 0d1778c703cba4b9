//! Entity data model, normalization, and relationship resolution.
//!
//! This crate defines the typed entities produced by ingestion without any
//! network or database dependencies. Raw API items enter through the
//! normalizer; everything downstream works with the typed structs and the
//! resolver's explicit result values.

pub mod normalize;
pub mod resolve;
pub mod types;
pub mod url_list;

pub use normalize::{
    NormalizeError, normalize, normalize_character, normalize_episode, normalize_location,
};
pub use resolve::{
    CharacterRef, LookupTable, Named, Resolution, ResolveError, build_lookup,
    child_id_from_url, resolve_character, resolve_foreign_key, resolve_relationships, resolve_url,
};
pub use types::*;
pub use url_list::{encode_url_list, parse_url_list, parse_url_list_str};
