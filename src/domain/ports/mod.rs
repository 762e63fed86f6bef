mod clock_port;
mod credential_port;
mod error_decoder_port;
mod key_value_store_port;
mod transport_port;

pub use clock_port::{Clock, SystemClock};
pub use credential_port::{CredentialSource, TokenStoragePort};
pub use error_decoder_port::{ErrorDecodeFailure, ErrorDecoder};
pub use key_value_store_port::KeyValueStore;
pub use transport_port::{
    CachePolicy, Headers, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartUpload,
    RequestBody, TransportError,
};
