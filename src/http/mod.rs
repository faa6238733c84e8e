//! HTTP plumbing shared by both clients: request description, transports,
//! the retry loop and error classification.

mod classify;
mod executor;
mod headers;
mod request;
mod retry;
mod transport;

pub use classify::classify;
pub use executor::{RetryState, Step, execute, execute_blocking};
pub use headers::{REQUEST_ID_HEADER, RETRY_AFTER_HEADER, USER_ID_HEADER, default_headers, user_agent};
pub use request::{FileUpload, Method, RequestDescriptor};
pub use retry::{
    INITIAL_DELAY, MAX_DELAY, MAX_RETRIES, RetryPolicy, TRANSIENT_STATUSES, parse_retry_after,
};
pub use transport::{
    AsyncTransport, BlockingHttpTransport, HttpTransport, RawResponse, Transport, TransportError,
};

#[cfg(test)]
pub use transport::{MockAsyncTransport, MockTransport};
