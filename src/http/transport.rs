//! One raw HTTP exchange per call, blocking or async.
//!
//! Transports never look at status codes; they only report whether a response
//! arrived. Retries and classification happen a layer above.

use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;

use super::headers::{REQUEST_ID_HEADER, RETRY_AFTER_HEADER, default_headers, multipart_headers};
use super::request::{FileUpload, RequestDescriptor};
use super::retry::parse_retry_after;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Status, headers and undecoded body of one HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// `Retry-After` in seconds, when present in numeric form.
    pub fn retry_after(&self) -> Option<f64> {
        self.header(RETRY_AFTER_HEADER).and_then(parse_retry_after)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network failure that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Request(String),
}

impl TransportError {
    /// Connect and timeout failures may go away on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connect(msg) => Error::Connection(msg),
            TransportError::Timeout(msg) => Error::Timeout(msg),
            TransportError::Request(msg) => Error::Request(msg),
        }
    }
}

/// Performs one HTTP exchange on the calling thread.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// Performs one HTTP exchange as a future.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// Async transport backed by a `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            headers: default_headers(config)?,
        })
    }
}

#[async_trait]
impl AsyncTransport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let url = self.config.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .query(&request.query);

        builder = match &request.file {
            Some(upload) => builder
                .headers(multipart_headers(&self.headers))
                .multipart(async_form(upload)?),
            None => {
                let builder = builder.headers(self.headers.clone());
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Blocking transport backed by a `reqwest::blocking::Client`.
///
/// Must not be created or used from inside an async runtime.
pub struct BlockingHttpTransport {
    client: reqwest::blocking::Client,
    config: ClientConfig,
    headers: HeaderMap,
}

impl BlockingHttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            headers: default_headers(config)?,
        })
    }
}

impl Transport for BlockingHttpTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let url = self.config.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .query(&request.query);

        builder = match &request.file {
            Some(upload) => builder
                .headers(multipart_headers(&self.headers))
                .multipart(blocking_form(upload)?),
            None => {
                let builder = builder.headers(self.headers.clone());
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn async_form(upload: &FileUpload) -> Result<reqwest::multipart::Form, TransportError> {
    let mut part = reqwest::multipart::Part::bytes(upload.content.clone())
        .file_name(upload.file_name.clone());
    if let Some(mime) = &upload.mime_type {
        part = part.mime_str(mime)?;
    }

    let form = upload
        .fields
        .iter()
        .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
            form.text(name.clone(), value.clone())
        });
    Ok(form.part(upload.field_name.clone(), part))
}

fn blocking_form(
    upload: &FileUpload,
) -> Result<reqwest::blocking::multipart::Form, TransportError> {
    let mut part = reqwest::blocking::multipart::Part::bytes(upload.content.clone())
        .file_name(upload.file_name.clone());
    if let Some(mime) = &upload.mime_type {
        part = part.mime_str(mime)?;
    }

    let form = upload
        .fields
        .iter()
        .fold(reqwest::blocking::multipart::Form::new(), |form, (name, value)| {
            form.text(name.clone(), value.clone())
        });
    Ok(form.part(upload.field_name.clone(), part))
}
