//! Typed API client.
//!
//! Every operation comes in two forms: an `async fn` for sequential call
//! sites and a `*_future` variant returning an [`ApiFuture`] that is already
//! running. Both go through the same request building and response
//! classification.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error_decoder::JsonErrorDecoder;
use super::future::ApiFuture;
use super::transport::{DEFAULT_TIMEOUT_SECS, ReqwestTransport};
use crate::domain::errors::ApiError;
use crate::domain::ports::{
    CachePolicy, CredentialSource, ErrorDecoder, Headers, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, MultipartUpload, RequestBody,
};

const AUTHORIZATION: &str = "authorization";

/// Success type for endpoints whose body is ignored.
///
/// Deserializes from anything, including an empty body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResponse;

impl<'de> serde::Deserialize<'de> for EmptyResponse {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

/// Credential source that never yields a token.
#[derive(Debug, Clone, Copy, Default)]
struct Anonymous;

impl CredentialSource for Anonymous {
    fn token(&self) -> Option<crate::domain::entities::AuthToken> {
        None
    }
}

struct ClientInner {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialSource>,
    error_decoder: Arc<dyn ErrorDecoder>,
}

/// Typed HTTP client resolving paths against a base URL.
///
/// Cheap to clone; clones share the transport, credential source and error
/// decoder.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    transport: Option<Arc<dyn HttpTransport>>,
    credentials: Arc<dyn CredentialSource>,
    error_decoder: Arc<dyn ErrorDecoder>,
    user_agent: Option<String>,
    timeout: Duration,
}

impl ApiClientBuilder {
    /// Uses `transport` instead of the default `reqwest` one.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the bearer token source.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replaces the decoder used for failure bodies.
    #[must_use]
    pub fn error_decoder(mut self, decoder: Arc<dyn ErrorDecoder>) -> Self {
        self.error_decoder = decoder;
        self
    }

    /// Sets the user agent of the default transport.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the request timeout of the default transport.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    /// Returns error if the default transport cannot be created.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let transport = match self.user_agent {
                    Some(agent) => ReqwestTransport::with_options(&agent, self.timeout),
                    None => ReqwestTransport::new(),
                }
                .map_err(|e| ApiError::local(e.to_string()))?;
                Arc::new(transport)
            }
        };

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                transport,
                credentials: self.credentials,
                error_decoder: self.error_decoder,
            }),
        })
    }
}

impl ApiClient {
    /// Starts building a client for `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            transport: None,
            credentials: Arc::new(Anonymous),
            error_decoder: Arc::new(JsonErrorDecoder),
            user_agent: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Sends a GET request and decodes the body as `T`.
    ///
    /// # Errors
    /// Returns error on transport failure, a status of 300 or above, or a
    /// body that does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(HttpMethod::Get, path, RequestBody::Empty, &Headers::new())
            .await
    }

    /// Sends `body` as JSON in a POST request and decodes the reply as `T`.
    ///
    /// # Errors
    /// See [`get`](Self::get); also fails if `body` cannot be serialized.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: &Headers,
    ) -> Result<T, ApiError> {
        let body = json_body(body)?;
        self.request(HttpMethod::Post, path, body, headers).await
    }

    /// Sends `body` as JSON in a PUT request and decodes the reply as `T`.
    ///
    /// # Errors
    /// See [`post`](Self::post).
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = json_body(body)?;
        self.request(HttpMethod::Put, path, body, &Headers::new())
            .await
    }

    /// Sends a DELETE request and decodes the reply as `T`.
    ///
    /// # Errors
    /// See [`get`](Self::get).
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: &Headers,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Delete, path, RequestBody::Empty, headers)
            .await
    }

    /// Uploads a file as a multipart form with a PUT request.
    ///
    /// # Errors
    /// Returns error on transport failure or a status of 300 or above.
    pub async fn upload_multipart(
        &self,
        path: &str,
        upload: MultipartUpload,
    ) -> Result<(), ApiError> {
        let request = self.build_request(
            HttpMethod::Put,
            self.url_for(path),
            RequestBody::Multipart(upload),
            &Headers::new(),
        );
        let response = self.send(request).await?;
        self.check_status(response).map(|_| ())
    }

    /// Downloads raw bytes from an absolute URL, bypassing any transport
    /// cache. No credentials are attached.
    ///
    /// # Errors
    /// Returns error if `url` is not a valid absolute URL, on transport
    /// failure, or on a status of 300 or above.
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes, ApiError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| {
            debug!(url = %url, error = %e, "Rejected image URL");
            ApiError::local("Invalid url")
        })?;

        let mut request = HttpRequest::new(HttpMethod::Get, parsed.as_str());
        request.cache_policy = CachePolicy::Bypass;

        let response = self.send(request).await?;
        self.check_status(response)
    }

    /// Future form of [`get`](Self::get).
    pub fn get_future<T>(&self, path: impl Into<String>) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let path = path.into();
        ApiFuture::spawn(async move { client.get(&path).await })
    }

    /// Future form of [`post`](Self::post). The body is serialized before
    /// this returns.
    pub fn post_future<T, B>(&self, path: impl Into<String>, body: &B, headers: Headers) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = match json_body(body) {
            Ok(body) => body,
            Err(e) => return ApiFuture::ready(Err(e)),
        };
        let client = self.clone();
        let path = path.into();
        ApiFuture::spawn(async move {
            client
                .request(HttpMethod::Post, &path, body, &headers)
                .await
        })
    }

    /// Future form of [`put`](Self::put). The body is serialized before
    /// this returns.
    pub fn put_future<T, B>(&self, path: impl Into<String>, body: &B) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = match json_body(body) {
            Ok(body) => body,
            Err(e) => return ApiFuture::ready(Err(e)),
        };
        let client = self.clone();
        let path = path.into();
        ApiFuture::spawn(async move {
            client
                .request(HttpMethod::Put, &path, body, &Headers::new())
                .await
        })
    }

    /// Future form of [`delete`](Self::delete).
    pub fn delete_future<T>(&self, path: impl Into<String>, headers: Headers) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let path = path.into();
        ApiFuture::spawn(async move { client.delete(&path, &headers).await })
    }

    /// Future form of [`upload_multipart`](Self::upload_multipart).
    pub fn upload_multipart_future(
        &self,
        path: impl Into<String>,
        upload: MultipartUpload,
    ) -> ApiFuture<()> {
        let client = self.clone();
        let path = path.into();
        ApiFuture::spawn(async move { client.upload_multipart(&path, upload).await })
    }

    /// Future form of [`fetch_image`](Self::fetch_image).
    pub fn fetch_image_future(&self, url: impl Into<String>) -> ApiFuture<Bytes> {
        let client = self.clone();
        let url = url.into();
        ApiFuture::spawn(async move { client.fetch_image(&url).await })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    /// Bearer header first, then caller headers, which win on collision.
    fn headers(&self, extra: &Headers) -> Headers {
        let mut headers = Headers::new();
        if let Some(token) = self.inner.credentials.token() {
            headers.insert(AUTHORIZATION.to_string(), token.bearer());
        }
        for (name, value) in extra {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: String,
        body: RequestBody,
        extra: &Headers,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        request.headers = self.headers(extra);
        request.body = body;
        request
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
        extra: &Headers,
    ) -> Result<T, ApiError> {
        let request = self.build_request(method, self.url_for(path), body, extra);
        let response = self.send(request).await?;
        let body = self.check_status(response)?;
        decode_body(&body)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method;
        let url = request.url.clone();
        self.inner.transport.execute(request).await.map_err(|e| {
            warn!(%method, url = %url, error = %e, "Network call failed");
            ApiError::transport(e.to_string())
        })
    }

    /// Passes 2xx bodies through and turns anything from 300 up into the
    /// decoded failure.
    fn check_status(&self, response: HttpResponse) -> Result<Bytes, ApiError> {
        if response.status < 300 {
            return Ok(response.body);
        }
        Err(self.decode_error(response.status, &response.body))
    }

    /// Runs the active decoder on every failure body, empty ones included.
    fn decode_error(&self, status: u16, body: &[u8]) -> ApiError {
        match self.inner.error_decoder.decode(body) {
            Ok(error) => {
                debug!(status, message = %error.message, code = ?error.code, "Server returned error");
                error.with_status(status)
            }
            Err(_) if body.is_empty() => {
                debug!(status, "Empty error body");
                ApiError::new(format!("request failed with status {status}"), None)
                    .with_status(status)
            }
            Err(e) => {
                debug!(status, error = %e, "Failed to decode error body");
                ApiError::decoding(e.to_string()).with_status(status)
            }
        }
    }
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody, ApiError> {
    serde_json::to_vec(body)
        .map(|bytes| RequestBody::Json(Bytes::from(bytes)))
        .map_err(|e| ApiError::local(format!("failed to serialize body: {e}")))
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };

    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Failed to decode response body");
        ApiError::decoding(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AuthToken;
    use crate::domain::ports::mocks::{MockCredentialSource, MockTransport};
    use crate::domain::ports::{ErrorDecodeFailure, TransportError};
    use serde::Deserialize;
    use tokio::sync::oneshot;
    use tokio_test::{assert_err, assert_ok};

    const BASE: &str = "https://api.example.com";

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
        name: String,
    }

    fn with_token(token: &'static str) -> Arc<MockCredentialSource> {
        let mut credentials = MockCredentialSource::new();
        credentials
            .expect_token()
            .returning(move || Some(AuthToken::new_unchecked(token)));
        Arc::new(credentials)
    }

    fn client(transport: &Arc<MockTransport>) -> ApiClient {
        ApiClient::builder(BASE)
            .transport(transport.clone())
            .credentials(with_token("secret-token"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_decodes_success_body() {
        let transport = Arc::new(MockTransport::responding(200, r#"{"id":1,"name":"one"}"#));
        let client = client(&transport);

        let item: Item = assert_ok!(client.get("/items/1").await);

        assert_eq!(
            item,
            Item {
                id: 1,
                name: "one".to_string()
            }
        );
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.example.com/items/1");
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].header("Authorization"), Some("Bearer secret-token"));
    }

    #[tokio::test]
    async fn test_not_found_decodes_domain_error() {
        let transport = Arc::new(MockTransport::responding(
            404,
            r#"{"message":"not found","code":"E404"}"#,
        ));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/items/9").await);

        assert_eq!(err.message, "not found");
        assert_eq!(err.code.as_deref(), Some("E404"));
        assert!(err.is_server());
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_redirect_status_is_failure() {
        let transport = Arc::new(MockTransport::responding(301, r#"{"message":"moved"}"#));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/old").await);
        assert_eq!(err.message, "moved");
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_decoding_error() {
        let transport = Arc::new(MockTransport::responding(200, r#"{"id":"x"}"#));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/items/1").await);

        assert!(err.is_decoding());
        assert!(err.message.contains("invalid type"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_unparseable_error_body_is_decoding_error() {
        let transport = Arc::new(MockTransport::responding(500, "<html>oops</html>"));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/items/1").await);

        assert!(err.is_decoding());
        assert!(!err.message.is_empty());
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_empty_error_body() {
        let transport = Arc::new(MockTransport::responding(503, Bytes::new()));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/items/1").await);
        assert!(err.message.contains("503"));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = Arc::new(MockTransport::failing(TransportError::Timeout));
        let client = client(&transport);

        let err = assert_err!(client.get::<Item>("/items/1").await);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_caller_headers_augment_and_override() {
        let transport = Arc::new(MockTransport::responding(201, "{}"));
        let client = client(&transport);
        let mut headers = Headers::new();
        headers.insert("X-Request-Id".to_string(), "42".to_string());
        headers.insert("Authorization".to_string(), "Bearer override".to_string());

        let _: EmptyResponse = assert_ok!(client.post("/items", &Item { id: 2, name: "two".into() }, &headers).await);

        let request = &transport.requests()[0];
        assert_eq!(request.header("x-request-id"), Some("42"));
        assert_eq!(request.header("authorization"), Some("Bearer override"));
        assert_eq!(
            request.body,
            RequestBody::Json(Bytes::from_static(br#"{"id":2,"name":"two"}"#))
        );
    }

    #[tokio::test]
    async fn test_no_token_no_authorization_header() {
        let transport = Arc::new(MockTransport::responding(204, Bytes::new()));
        let client = ApiClient::builder(BASE)
            .transport(transport.clone())
            .build()
            .unwrap();

        let _: () = assert_ok!(client.delete("/items/1", &Headers::new()).await);

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.header("authorization"), None);
    }

    #[tokio::test]
    async fn test_put_sends_json() {
        let transport = Arc::new(MockTransport::responding(200, r#"{"id":3,"name":"three"}"#));
        let client = client(&transport);

        let item: Item = assert_ok!(client.put("/items/3", &serde_json::json!({"name": "three"})).await);

        assert_eq!(item.id, 3);
        assert_eq!(transport.requests()[0].method, HttpMethod::Put);
    }

    struct LegacyDecoder;

    impl ErrorDecoder for LegacyDecoder {
        fn decode(&self, body: &[u8]) -> Result<ApiError, ErrorDecodeFailure> {
            #[derive(Deserialize)]
            struct Legacy {
                error: String,
            }
            let legacy: Legacy =
                serde_json::from_slice(body).map_err(|e| ErrorDecodeFailure(e.to_string()))?;
            Ok(ApiError::new(legacy.error, Some("LEGACY".to_string())))
        }
    }

    #[tokio::test]
    async fn test_custom_error_decoder_is_used() {
        let transport = Arc::new(MockTransport::responding(400, r#"{"error":"bad input"}"#));
        let client = ApiClient::builder(BASE)
            .transport(transport.clone())
            .error_decoder(Arc::new(LegacyDecoder))
            .build()
            .unwrap();

        let err = assert_err!(client.get::<Item>("/items").await);

        assert_eq!(err.message, "bad input");
        assert_eq!(err.code.as_deref(), Some("LEGACY"));
    }

    struct SessionDecoder;

    impl ErrorDecoder for SessionDecoder {
        fn decode(&self, body: &[u8]) -> Result<ApiError, ErrorDecodeFailure> {
            if body.is_empty() {
                return Ok(ApiError::new("session expired", Some("AUTH".to_string())));
            }
            Err(ErrorDecodeFailure("unexpected body".to_string()))
        }
    }

    #[tokio::test]
    async fn test_custom_decoder_sees_empty_body() {
        let transport = Arc::new(MockTransport::responding(401, Bytes::new()));
        let client = ApiClient::builder(BASE)
            .transport(transport.clone())
            .error_decoder(Arc::new(SessionDecoder))
            .build()
            .unwrap();

        let err = assert_err!(client.get::<Item>("/me").await);

        assert_eq!(err.message, "session expired");
        assert_eq!(err.code.as_deref(), Some("AUTH"));
        assert_eq!(err.status(), Some(401));
        assert!(err.is_server());
    }

    #[tokio::test]
    async fn test_upload_multipart() {
        let transport = Arc::new(MockTransport::responding(200, "ignored"));
        let client = client(&transport);
        let upload = MultipartUpload::new(&b"jpeg"[..], "avatar.jpg").field("user", "7");

        assert_ok!(client.upload_multipart("/avatar", upload.clone()).await);

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "https://api.example.com/avatar");
        assert_eq!(request.body, RequestBody::Multipart(upload));
        assert!(request.header("authorization").is_some());
    }

    #[tokio::test]
    async fn test_upload_multipart_failure() {
        let transport = Arc::new(MockTransport::responding(413, r#"{"message":"too large"}"#));
        let client = client(&transport);

        let err = assert_err!(
            client
                .upload_multipart("/avatar", MultipartUpload::new(&b"jpeg"[..], "a.jpg"))
                .await
        );
        assert_eq!(err.message, "too large");
    }

    #[tokio::test]
    async fn test_fetch_image_bypasses_cache_without_credentials() {
        let transport = Arc::new(MockTransport::responding(200, &b"\x89PNG"[..]));
        let client = client(&transport);

        let bytes = assert_ok!(client.fetch_image("https://cdn.example.com/a.png").await);

        assert_eq!(&bytes[..], b"\x89PNG");
        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://cdn.example.com/a.png");
        assert_eq!(request.cache_policy, CachePolicy::Bypass);
        assert_eq!(request.header("authorization"), None);
    }

    #[tokio::test]
    async fn test_fetch_image_invalid_url() {
        let transport = Arc::new(MockTransport::responding(200, "unused"));
        let client = client(&transport);

        let err = assert_err!(client.fetch_image("not a url").await);

        assert_eq!(err.message, "Invalid url");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_future_form_matches_async_form() {
        let transport = Arc::new(MockTransport::responding(
            404,
            r#"{"message":"not found","code":"E404"}"#,
        ));
        let client = client(&transport);

        let from_async = client.get::<Item>("/items/9").await;
        let from_future = client.get_future::<Item>("/items/9").await;

        assert_eq!(from_async, from_future);
        let requests = transport.requests();
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn test_future_callback_delivery() {
        let transport = Arc::new(MockTransport::responding(200, r#"{"id":5,"name":"five"}"#));
        let client = client(&transport);
        let (tx, rx) = oneshot::channel();

        client
            .post_future::<Item, _>("/items", &Item { id: 5, name: "five".into() }, Headers::new())
            .on_complete(move |result| {
                let _ = tx.send(result);
            });

        let item = rx.await.unwrap().unwrap();
        assert_eq!(item.id, 5);
    }

    #[tokio::test]
    async fn test_other_future_forms() {
        let transport = Arc::new(MockTransport::responding(200, "{}"));
        let client = client(&transport);

        assert_ok!(client.put_future::<EmptyResponse, _>("/a", &1).await);
        assert_ok!(client.delete_future::<EmptyResponse>("/b", Headers::new()).await);
        assert_ok!(
            client
                .upload_multipart_future("/c", MultipartUpload::new(&b"x"[..], "x.jpg"))
                .await
        );
        assert_ok!(client.fetch_image_future("https://cdn.example.com/d.png").await);
        assert_eq!(transport.call_count(), 4);
    }
}
