//! Standard and authentication headers sent with every request.

use log::debug;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};

use crate::config::{ClientConfig, mask_secret};
use crate::error::{Error, Result};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// `User-Agent` value naming this library and its version.
pub fn user_agent() -> String {
    format!("memclient-rust/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds the headers shared by every request made with `config`.
///
/// Custom headers are applied last and replace any standard header of the same name.
pub fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, header_value(&user_agent())?);

    let credential = non_empty(&config.api_key)
        .map(|key| ("API key", key))
        .or_else(|| non_empty(&config.bearer_token).map(|token| ("bearer token", token)));

    if let Some((source, secret)) = credential {
        let mut value = header_value(&format!("Bearer {}", secret))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        debug!("Authenticating with {}: {}", source, mask_secret(secret));
    }

    if let Some(user_id) = non_empty(&config.user_id) {
        headers.insert(HeaderName::from_static(USER_ID_HEADER), header_value(user_id)?);
    }

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

/// Headers for a multipart upload: the defaults minus `Content-Type`,
/// which the transport fills in with the form boundary.
pub fn multipart_headers(defaults: &HeaderMap) -> HeaderMap {
    let mut headers = defaults.clone();
    headers.remove(CONTENT_TYPE);
    headers
}

/// Empty credentials count as unset.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("invalid header value: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_headers() {
        let headers = default_headers(&ClientConfig::default()).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[ACCEPT], "application/json");
        assert!(
            headers[USER_AGENT]
                .to_str()
                .unwrap()
                .starts_with("memclient-rust/")
        );
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(USER_ID_HEADER).is_none());
    }

    #[test]
    fn test_api_key_wins_over_bearer_token() {
        let config = ClientConfig::default()
            .with_bearer_token("token")
            .with_api_key("key");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer key");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_bearer_token_used_without_api_key() {
        let config = ClientConfig::default().with_bearer_token("token");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer token");
    }

    #[test]
    fn test_empty_api_key_falls_back_to_bearer_token() {
        let config = ClientConfig::default()
            .with_api_key("")
            .with_bearer_token("tok");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn test_empty_credentials_send_nothing() {
        let config = ClientConfig::default()
            .with_api_key("")
            .with_bearer_token("")
            .with_user_id("");
        let headers = default_headers(&config).unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get(USER_ID_HEADER).is_none());
    }

    #[test]
    fn test_user_id_sent_alongside_credentials() {
        let config = ClientConfig::default()
            .with_api_key("key")
            .with_user_id("dev-user");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer key");
        assert_eq!(headers[USER_ID_HEADER], "dev-user");
    }

    #[test]
    fn test_custom_headers_override_standard() {
        let config = ClientConfig::default()
            .with_header("Accept", "text/plain")
            .with_header("X-Trace", "abc");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[ACCEPT], "text/plain");
        assert_eq!(headers["x-trace"], "abc");
        assert_eq!(headers.get_all(ACCEPT).iter().count(), 1);
    }

    #[test]
    fn test_invalid_custom_header_is_config_error() {
        let config = ClientConfig::default().with_header("bad header", "x");
        assert!(matches!(default_headers(&config), Err(Error::Config(_))));

        let config = ClientConfig::default().with_header("X-Ok", "line\nbreak");
        assert!(matches!(default_headers(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_multipart_headers_drop_content_type() {
        let defaults = default_headers(&ClientConfig::default().with_api_key("key")).unwrap();
        let headers = multipart_headers(&defaults);
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert_eq!(headers[AUTHORIZATION], "Bearer key");
        assert_eq!(headers[ACCEPT], "application/json");
    }
}
