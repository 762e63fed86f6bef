//! Deduplicating image loader.
//!
//! Checks the cache, fetches on a miss, populates the cache and notifies
//! subscribers. Concurrent requests for an image already being fetched share
//! that fetch.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::domain::entities::{DedupScope, FetchState, ImageEvent};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::http::ApiClient;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for the image loader.
#[derive(Debug, Clone)]
pub struct ImageLoaderConfig {
    /// Minutes fetched images stay cached. `None` disables cache writes;
    /// cache reads still happen.
    pub cache_minutes: Option<u32>,
    /// Deduplication scope for concurrent requests.
    pub dedup: DedupScope,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            cache_minutes: None,
            dedup: DedupScope::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, FetchState>>;

struct LoaderInner {
    client: ApiClient,
    cache: CacheService,
    config: ImageLoaderConfig,
    events: broadcast::Sender<ImageEvent>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    /// Outcome of the most recent request. Older outcomes are dropped so
    /// finished payloads do not pile up in memory.
    current: Mutex<Option<(String, FetchState)>>,
}

/// Loads images by URL for one consumer.
///
/// Cheap to clone; clones share in-flight fetches and the event channel.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Receiving end of an [`ImageLoader`]'s events.
///
/// Only events published after subscribing are seen. Dropping the value
/// unsubscribes.
#[derive(Debug)]
pub struct ImageSubscription {
    receiver: broadcast::Receiver<ImageEvent>,
}

impl ImageSubscription {
    /// Waits for the next event. Returns `None` once the loader is gone.
    ///
    /// Events dropped because this subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<ImageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Image subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ImageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Image subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

impl ImageLoader {
    /// Creates a loader fetching through `client` and caching in `cache`.
    #[must_use]
    pub fn new(client: ApiClient, cache: CacheService, config: ImageLoaderConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(LoaderInner {
                client,
                cache,
                config,
                events,
                in_flight: Mutex::new(HashMap::new()),
                current: Mutex::new(None),
            }),
        }
    }

    /// Subscribes to loader events.
    #[must_use]
    pub fn subscribe(&self) -> ImageSubscription {
        ImageSubscription {
            receiver: self.inner.events.subscribe(),
        }
    }

    /// Returns the state for `url`.
    ///
    /// Only running fetches and the most recent request are tracked; any
    /// other URL reports [`FetchState::Idle`].
    #[must_use]
    pub fn state(&self, url: &str) -> FetchState {
        if self.inner.in_flight.lock().contains_key(url) {
            return FetchState::InFlight;
        }
        match &*self.inner.current.lock() {
            Some((current, state)) if current == url => state.clone(),
            _ => FetchState::Idle,
        }
    }

    fn set_current(&self, url: &str, state: FetchState) {
        *self.inner.current.lock() = Some((url.to_string(), state));
    }

    /// Returns the number of fetches currently running.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Starts loading `url` in the background. The outcome arrives as
    /// events.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn show_image(&self, url: Option<&str>) {
        let loader = self.clone();
        let url = url.map(str::to_owned);
        tokio::spawn(async move {
            loader.load(url.as_deref()).await;
        });
    }

    /// Loads `url` and returns the resulting state.
    ///
    /// Publishes the same events as [`show_image`](Self::show_image).
    /// Returns [`FetchState::Idle`] when the request was dropped because
    /// the loader deduplicates per instance and another URL is in flight.
    pub async fn load(&self, url: Option<&str>) -> FetchState {
        let Some(url) = url else {
            debug!("Image requested without URL");
            self.publish(ImageEvent::Failed);
            return FetchState::Failed;
        };

        if let Some(fetch) = self.join_in_flight(url) {
            return fetch.await;
        }

        if let Some(bytes) = self.inner.cache.get(url).await {
            trace!(url = %url, "Image served from cache");
            let state = FetchState::Succeeded(bytes.clone());
            self.set_current(url, state.clone());
            self.publish_changed(url, bytes).await;
            return state;
        }

        match self.start_fetch(url) {
            Some(fetch) => fetch.await,
            None => FetchState::Idle,
        }
    }

    fn join_in_flight(&self, url: &str) -> Option<SharedFetch> {
        let in_flight = self.inner.in_flight.lock();
        let fetch = in_flight.get(url).cloned();
        if fetch.is_some() {
            trace!(url = %url, "Joining in-flight image fetch");
        }
        fetch
    }

    /// Registers and spawns a fetch for `url`, or joins one registered
    /// since the cache was checked.
    fn start_fetch(&self, url: &str) -> Option<SharedFetch> {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(existing) = in_flight.get(url) {
            return Some(existing.clone());
        }

        if self.inner.config.dedup == DedupScope::PerInstance && !in_flight.is_empty() {
            debug!(url = %url, "Dropping image request, another fetch is in flight");
            return None;
        }

        self.set_current(url, FetchState::InFlight);

        let loader = self.clone();
        let owned_url = url.to_string();
        let handle = tokio::spawn(async move { loader.fetch(owned_url).await });

        let fetch_url = url.to_string();
        let fetch = async move {
            handle.await.unwrap_or_else(|e| {
                warn!(url = %fetch_url, error = %e, "Image fetch task did not complete");
                FetchState::Failed
            })
        }
        .boxed()
        .shared();

        in_flight.insert(url.to_string(), fetch.clone());
        Some(fetch)
    }

    async fn fetch(&self, url: String) -> FetchState {
        self.publish(ImageEvent::Started);
        debug!(url = %url, "Fetching image");

        let result = self.inner.client.fetch_image(&url).await;

        let state = match result {
            Ok(bytes) => {
                if let Some(minutes) = self.inner.config.cache_minutes {
                    self.inner.cache.put(&url, bytes.clone(), Some(minutes)).await;
                }
                FetchState::Succeeded(bytes)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Image fetch failed");
                FetchState::Failed
            }
        };

        self.set_current(&url, state.clone());
        self.inner.in_flight.lock().remove(&url);

        match &state {
            FetchState::Succeeded(bytes) => self.publish_changed(&url, bytes.clone()).await,
            _ => self.publish(ImageEvent::Failed),
        }

        state
    }

    async fn publish_changed(&self, url: &str, bytes: Bytes) {
        let image = decode(url, bytes).await;
        self.publish(ImageEvent::Changed {
            url: url.to_string(),
            image,
        });
    }

    fn publish(&self, event: ImageEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }
}

async fn decode(url: &str, bytes: Bytes) -> Option<Arc<::image::DynamicImage>> {
    let decoded = tokio::task::spawn_blocking(move || ::image::load_from_memory(&bytes)).await;

    match decoded {
        Ok(Ok(image)) => Some(Arc::new(image)),
        Ok(Err(e)) => {
            debug!(url = %url, error = %e, "Failed to decode image");
            None
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Decode task panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TransportError;
    use crate::domain::ports::mocks::MockTransport;
    use crate::infrastructure::cache::MemoryKeyValueStore;
    use std::io::Cursor;
    use std::time::Duration;

    const URL: &str = "https://cdn.example.com/cat.png";
    const OTHER_URL: &str = "https://cdn.example.com/dog.png";

    fn png() -> Bytes {
        let mut buf = Vec::new();
        ::image::DynamicImage::new_rgba8(2, 2)
            .write_to(&mut Cursor::new(&mut buf), ::image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    fn cache() -> CacheService {
        CacheService::new(Arc::new(MemoryKeyValueStore::new()))
    }

    fn loader(transport: &Arc<MockTransport>, cache: CacheService, config: ImageLoaderConfig) -> ImageLoader {
        let client = ApiClient::builder("https://api.example.com")
            .transport(transport.clone())
            .build()
            .unwrap();
        ImageLoader::new(client, cache, config)
    }

    fn with_ttl(minutes: u32) -> ImageLoaderConfig {
        ImageLoaderConfig {
            cache_minutes: Some(minutes),
            ..ImageLoaderConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_url_fails_without_io() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let store = Arc::new(MemoryKeyValueStore::new());
        let loader = loader(
            &transport,
            CacheService::new(store.clone()),
            with_ttl(30),
        );
        let mut events = loader.subscribe();

        let state = loader.load(None).await;

        assert_eq!(state, FetchState::Failed);
        assert!(matches!(events.recv().await, Some(ImageEvent::Failed)));
        assert_eq!(transport.call_count(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_emits_started_then_changed() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let loader = loader(&transport, cache(), ImageLoaderConfig::default());
        let mut events = loader.subscribe();

        let state = loader.load(Some(URL)).await;

        assert!(state.is_succeeded());
        assert!(matches!(events.recv().await, Some(ImageEvent::Started)));
        match events.recv().await {
            Some(ImageEvent::Changed { url, image }) => {
                assert_eq!(url, URL);
                let image = image.unwrap();
                assert_eq!((image.width(), image.height()), (2, 2));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(loader.state(URL), state);
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = Arc::new(MockTransport::responding(500, Bytes::new()));
        let cache = cache();
        cache.put(URL, png(), Some(30)).await;
        let loader = loader(&transport, cache, with_ttl(30));
        let mut events = loader.subscribe();

        let state = loader.load(Some(URL)).await;

        assert_eq!(state, FetchState::Succeeded(png()));
        assert!(matches!(events.recv().await, Some(ImageEvent::Changed { .. })));
        assert!(events.try_recv().is_none());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetched_image_served_from_cache_within_ttl() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let loader = loader(&transport, cache(), with_ttl(30));

        assert!(loader.load(Some(URL)).await.is_succeeded());
        assert!(loader.load(Some(URL)).await.is_succeeded());

        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_without_ttl_nothing_is_cached() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let store = Arc::new(MemoryKeyValueStore::new());
        let loader = loader(
            &transport,
            CacheService::new(store.clone()),
            ImageLoaderConfig::default(),
        );

        loader.load(Some(URL)).await;
        loader.load(Some(URL)).await;

        assert!(store.is_empty().await);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let transport = Arc::new(
            MockTransport::responding(200, png()).with_delay(Duration::from_millis(50)),
        );
        let loader = loader(&transport, cache(), with_ttl(30));
        let mut events = loader.subscribe();

        let (first, second) = tokio::join!(loader.load(Some(URL)), loader.load(Some(URL)));

        assert_eq!(first, second);
        assert!(first.is_succeeded());
        assert_eq!(transport.call_count(), 1);
        assert!(matches!(events.recv().await, Some(ImageEvent::Started)));
        assert!(matches!(events.recv().await, Some(ImageEvent::Changed { .. })));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_in_flight_state_visible() {
        let transport = Arc::new(
            MockTransport::responding(200, png()).with_delay(Duration::from_millis(50)),
        );
        let loader = loader(&transport, cache(), ImageLoaderConfig::default());
        let mut events = loader.subscribe();

        loader.show_image(Some(URL));
        assert!(matches!(events.recv().await, Some(ImageEvent::Started)));

        assert_eq!(loader.state(URL), FetchState::InFlight);
        assert_eq!(loader.in_flight_count(), 1);
        assert!(matches!(events.recv().await, Some(ImageEvent::Changed { .. })));
    }

    #[tokio::test]
    async fn test_per_url_dedup_fetches_distinct_urls() {
        let transport = Arc::new(
            MockTransport::responding(200, png()).with_delay(Duration::from_millis(50)),
        );
        let loader = loader(&transport, cache(), ImageLoaderConfig::default());

        let (first, second) = tokio::join!(loader.load(Some(URL)), loader.load(Some(OTHER_URL)));

        assert!(first.is_succeeded());
        assert!(second.is_succeeded());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_per_instance_dedup_drops_other_urls() {
        let transport = Arc::new(
            MockTransport::responding(200, png()).with_delay(Duration::from_millis(50)),
        );
        let config = ImageLoaderConfig {
            dedup: DedupScope::PerInstance,
            ..ImageLoaderConfig::default()
        };
        let loader = loader(&transport, cache(), config);

        let (first, second) = tokio::join!(loader.load(Some(URL)), loader.load(Some(OTHER_URL)));

        assert!(first.is_succeeded());
        assert_eq!(second, FetchState::Idle);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(loader.state(OTHER_URL), FetchState::Idle);
    }

    #[tokio::test]
    async fn test_failed_fetch() {
        let transport = Arc::new(MockTransport::failing(TransportError::Timeout));
        let loader = loader(&transport, cache(), with_ttl(30));
        let mut events = loader.subscribe();

        let state = loader.load(Some(URL)).await;

        assert_eq!(state, FetchState::Failed);
        assert!(matches!(events.recv().await, Some(ImageEvent::Started)));
        assert!(matches!(events.recv().await, Some(ImageEvent::Failed)));
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let transport = Arc::new(MockTransport::responding(404, r#"{"message":"gone"}"#));
        let loader = loader(&transport, cache(), with_ttl(30));

        assert_eq!(loader.load(Some(URL)).await, FetchState::Failed);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_still_cached() {
        let transport = Arc::new(MockTransport::responding(200, "not an image"));
        let cache = cache();
        let loader = loader(&transport, cache.clone(), with_ttl(30));
        let mut events = loader.subscribe();

        let state = loader.load(Some(URL)).await;

        assert!(state.is_succeeded());
        assert!(matches!(events.recv().await, Some(ImageEvent::Started)));
        assert!(matches!(
            events.recv().await,
            Some(ImageEvent::Changed { image: None, .. })
        ));
        assert_eq!(cache.get(URL).await, Some(Bytes::from_static(b"not an image")));
    }

    #[tokio::test]
    async fn test_only_latest_outcome_retained() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let loader = loader(&transport, cache(), ImageLoaderConfig::default());

        assert!(loader.load(Some(URL)).await.is_succeeded());
        assert!(loader.state(URL).is_succeeded());

        assert!(loader.load(Some(OTHER_URL)).await.is_succeeded());

        assert_eq!(loader.state(URL), FetchState::Idle);
        assert_eq!(loader.state(OTHER_URL), FetchState::Succeeded(png()));
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let transport = Arc::new(MockTransport::responding(200, png()));
        let loader = loader(&transport, cache(), ImageLoaderConfig::default());

        loader.load(Some(URL)).await;
        let mut events = loader.subscribe();

        assert!(events.try_recv().is_none());
    }
}
