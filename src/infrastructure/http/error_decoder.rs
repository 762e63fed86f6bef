//! Default error decoder.

use crate::domain::errors::ApiError;
use crate::domain::ports::{ErrorDecodeFailure, ErrorDecoder};

/// Decodes `{"message": ..., "code": ...}` failure bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorDecoder;

impl ErrorDecoder for JsonErrorDecoder {
    fn decode(&self, body: &[u8]) -> Result<ApiError, ErrorDecodeFailure> {
        serde_json::from_slice::<ApiError>(body).map_err(|e| ErrorDecodeFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(r#"{"message":"not found","code":"E404"}"#, "not found", Some("E404") ; "message_and_code")]
    #[test_case(r#"{"message":"forbidden"}"#, "forbidden", None ; "message_only")]
    #[test_case(r#"{"message":"teapot","code":null,"extra":1}"#, "teapot", None ; "null_code_extra_fields")]
    fn test_decodes_standard_shape(body: &str, message: &str, code: Option<&str>) {
        let err = JsonErrorDecoder.decode(body.as_bytes()).unwrap();

        assert_eq!(err.message, message);
        assert_eq!(err.code.as_deref(), code);
    }

    #[test_case(b"" ; "empty_body")]
    #[test_case(b"<html>502</html>" ; "html_body")]
    #[test_case(br#"{"code":"E1"}"# ; "missing_message")]
    fn test_rejects_other_shapes(body: &[u8]) {
        assert!(JsonErrorDecoder.decode(body).is_err());
    }
}
