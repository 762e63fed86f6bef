//! Domain types for image loading.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Load state of a single image URL inside one loader.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    /// Nothing has been requested, or the request was swallowed.
    #[default]
    Idle,
    /// A network fetch is running.
    InFlight,
    /// Bytes are available, either from cache or network.
    Succeeded(Bytes),
    /// The fetch failed or no URL was given.
    Failed,
}

impl FetchState {
    /// Returns true if a fetch is running.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }

    /// Returns true if bytes are available.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns true if loading failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns the loaded bytes, if any.
    #[must_use]
    pub const fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Succeeded(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Notification published by an image loader.
///
/// `Started` and `Failed` carry no payload; subscribers match `Changed`
/// against the URL they last requested.
#[derive(Debug, Clone)]
pub enum ImageEvent {
    /// A network fetch is about to be issued.
    Started,
    /// An image is available for `url`. `image` is `None` when the bytes
    /// could not be decoded.
    Changed {
        /// The URL the image was loaded from.
        url: String,
        /// The decoded image.
        image: Option<Arc<::image::DynamicImage>>,
    },
    /// Loading failed.
    Failed,
}

impl ImageEvent {
    /// Returns the URL of a `Changed` event.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Changed { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// How far a loader deduplicates concurrent requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupScope {
    /// One in-flight fetch per URL; requests for other URLs proceed.
    #[default]
    PerUrl,
    /// One in-flight fetch per loader; requests for any other URL are
    /// dropped while a fetch runs.
    PerInstance,
}
