//! Turning a terminal HTTP response into what the caller asked for.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::http::{self, RawResponse, RequestDescriptor};

/// Body of a successful response, shaped by the request's `raw` flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON. An empty body parses as `null`.
    Json(Value),
    /// Body exactly as received.
    Bytes(Vec<u8>),
}

impl Payload {
    /// Classifies error statuses, then keeps the body raw or parses it as JSON.
    pub fn from_response(request: &RequestDescriptor, response: RawResponse) -> Result<Self> {
        if !response.is_success() {
            let error = http::classify(&response);
            debug!("{} {} failed: {}", request.method, request.path, error);
            return Err(error.into());
        }

        if request.raw {
            return Ok(Payload::Bytes(response.body));
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::Json(Value::Null));
        }
        Ok(Payload::Json(serde_json::from_slice(&response.body)?))
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Json(value) => Ok(serde_json::to_vec(&value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::HealthResponse;
    use serde_json::json;

    #[test]
    fn test_json_body_is_parsed() {
        let payload = Payload::from_response(
            &RequestDescriptor::get("/health"),
            RawResponse::new(200, r#"{"status": "ok"}"#),
        )
        .unwrap();
        assert_eq!(payload, Payload::Json(json!({"status": "ok"})));
        assert_eq!(payload.json::<HealthResponse>().unwrap().status, "ok");
    }

    #[test]
    fn test_empty_body_is_null() {
        let payload = Payload::from_response(
            &RequestDescriptor::delete("/memories/m1"),
            RawResponse::new(204, ""),
        )
        .unwrap();
        assert_eq!(payload, Payload::Json(Value::Null));
        payload.json::<()>().unwrap();
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let err = Payload::from_response(
            &RequestDescriptor::get("/health"),
            RawResponse::new(200, "not json"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_raw_request_keeps_bytes() {
        let audio = vec![0xFF, 0xFB, 0x90, 0x00];
        let payload = Payload::from_response(
            &RequestDescriptor::post("/speech/tts").raw(),
            RawResponse::new(200, audio.clone()),
        )
        .unwrap();
        assert_eq!(payload.into_bytes().unwrap(), audio);
    }

    #[test]
    fn test_raw_request_error_is_classified() {
        let err = Payload::from_response(
            &RequestDescriptor::post("/speech/tts").raw(),
            RawResponse::new(403, r#"{"detail": "TTS not enabled for this plan"}"#),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("TTS not enabled"));
    }
}
