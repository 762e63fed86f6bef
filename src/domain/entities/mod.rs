//! Domain entity definitions.

mod cache_entry;
mod image;
mod token;

pub use cache_entry::CacheEntry;
pub use image::{DedupScope, FetchState, ImageEvent};
pub use token::AuthToken;
