//! Image state for a single view bound to an image loader.

use std::sync::Arc;

use crate::domain::entities::ImageEvent;
use crate::infrastructure::image::ImageLoader;

/// What a view shows for its current image URL.
///
/// Loaders never cancel superseded fetches, so a `Changed` event for a URL
/// the view no longer wants can arrive late. Such events are ignored.
#[derive(Debug, Clone, Default)]
pub struct UrlImageState {
    url: Option<String>,
    image: Option<Arc<::image::DynamicImage>>,
    loading: bool,
    failed: bool,
}

impl UrlImageState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the view at `url` and asks `loader` for it.
    pub fn request(&mut self, loader: &ImageLoader, url: Option<&str>) {
        self.url = url.map(str::to_owned);
        loader.show_image(url);
    }

    /// Applies a loader event. Returns true if the view changed.
    pub fn apply(&mut self, event: &ImageEvent) -> bool {
        match event {
            ImageEvent::Started => {
                self.image = None;
                self.loading = true;
                self.failed = false;
                true
            }
            ImageEvent::Failed => {
                self.image = None;
                self.loading = false;
                self.failed = true;
                true
            }
            ImageEvent::Changed { url, image } => {
                if self.url.as_deref() != Some(url.as_str()) {
                    return false;
                }
                self.image.clone_from(image);
                self.loading = false;
                self.failed = image.is_none();
                true
            }
        }
    }

    /// URL the view last requested.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Image to show, if loaded.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<::image::DynamicImage>> {
        self.image.as_ref()
    }

    /// Returns true while a fetch for the current URL is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns true if the last load failed or the bytes did not decode.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }
}
