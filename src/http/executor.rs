//! Retry state machine and its blocking and async drivers.
//!
//! [`RetryState`] decides what happens after each attempt without doing any I/O.
//! The drivers only perform the exchange and the wait it asks for, so both
//! concurrency models share one retry algorithm.

use log::{debug, warn};
use std::time::Duration;

use super::request::RequestDescriptor;
use super::retry::RetryPolicy;
use super::transport::{AsyncTransport, RawResponse, Transport, TransportError};

/// What the driver must do next.
#[derive(Debug, PartialEq)]
pub enum Step {
    /// Hand this response to the caller. It may still be an error status.
    Done(RawResponse),
    /// Give up with this transport failure.
    Fail(TransportError),
    /// Sleep, then attempt again.
    Wait(Duration),
}

/// Tracks attempts of one logical request.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl<'a> RetryState<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Zero-based index of the attempt about to run (or that just ran).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.policy.max_retries
    }

    /// Feeds the outcome of the current attempt and returns the next step.
    pub fn advance(&mut self, outcome: Result<RawResponse, TransportError>) -> Step {
        let delay = match outcome {
            Err(error) if !error.is_transient() => return Step::Fail(error),
            Err(error) => {
                if self.exhausted() {
                    return Step::Fail(error);
                }
                let delay = self.policy.compute_delay(self.attempt, None);
                warn!(
                    "Attempt {}/{} failed ({}), retrying in {}ms...",
                    self.attempt + 1,
                    self.policy.max_attempts(),
                    error,
                    delay.as_millis()
                );
                delay
            }
            Ok(response) => {
                if response.is_success() || !self.policy.should_retry(response.status) {
                    return Step::Done(response);
                }
                if self.exhausted() {
                    debug!(
                        "HTTP {} after {} attempts, giving up",
                        response.status,
                        self.attempt + 1
                    );
                    return Step::Done(response);
                }
                let delay = self
                    .policy
                    .compute_delay(self.attempt, response.retry_after());
                warn!(
                    "Attempt {}/{} got HTTP {}, retrying in {}ms...",
                    self.attempt + 1,
                    self.policy.max_attempts(),
                    response.status,
                    delay.as_millis()
                );
                delay
            }
        };

        self.attempt += 1;
        Step::Wait(delay)
    }
}

/// Runs `request` to a terminal outcome, sleeping the current thread between attempts.
pub fn execute_blocking<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &RequestDescriptor,
) -> Result<RawResponse, TransportError>
where
    T: Transport + ?Sized,
{
    let mut state = RetryState::new(policy);
    loop {
        match state.advance(transport.send(request)) {
            Step::Done(response) => return Ok(response),
            Step::Fail(error) => return Err(error),
            Step::Wait(delay) => std::thread::sleep(delay),
        }
    }
}

/// Runs `request` to a terminal outcome, yielding to the scheduler between attempts.
///
/// Dropping the returned future cancels the in-flight exchange or the pending wait.
pub async fn execute<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &RequestDescriptor,
) -> Result<RawResponse, TransportError>
where
    T: AsyncTransport + ?Sized,
{
    let mut state = RetryState::new(policy);
    loop {
        match state.advance(transport.send(request).await) {
            Step::Done(response) => return Ok(response),
            Step::Fail(error) => return Err(error),
            Step::Wait(delay) => tokio::time::sleep(delay).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::{MockAsyncTransport, MockTransport};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::ZERO)
            .with_jitter(0.0)
    }

    fn request() -> RequestDescriptor {
        RequestDescriptor::get("/health")
    }

    #[test]
    fn test_state_success_is_done() {
        let policy = instant_policy(3);
        let mut state = RetryState::new(&policy);
        assert_eq!(
            state.advance(Ok(RawResponse::new(200, "ok"))),
            Step::Done(RawResponse::new(200, "ok"))
        );
    }

    #[test]
    fn test_state_non_transient_status_is_done() {
        let policy = instant_policy(3);
        let mut state = RetryState::new(&policy);
        assert!(matches!(
            state.advance(Ok(RawResponse::new(404, ""))),
            Step::Done(r) if r.status == 404
        ));
    }

    #[test]
    fn test_state_waits_with_backoff_schedule() {
        let policy = RetryPolicy::default()
            .with_max_retries(3)
            .with_initial_delay(Duration::from_secs(1))
            .with_jitter(0.0);
        let mut state = RetryState::new(&policy);

        assert_eq!(
            state.advance(Ok(RawResponse::new(500, ""))),
            Step::Wait(Duration::from_secs(1))
        );
        assert_eq!(
            state.advance(Err(TransportError::Timeout("slow".into()))),
            Step::Wait(Duration::from_secs(2))
        );
        assert_eq!(
            state.advance(Ok(RawResponse::new(502, ""))),
            Step::Wait(Duration::from_secs(4))
        );
        assert_eq!(state.attempt(), 3);
        assert!(matches!(
            state.advance(Ok(RawResponse::new(503, ""))),
            Step::Done(r) if r.status == 503
        ));
    }

    #[test]
    fn test_state_honors_retry_after() {
        let policy = RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_secs(5))
            .with_jitter(0.0);
        let mut state = RetryState::new(&policy);

        let limited = RawResponse::new(429, "").with_header("Retry-After", "3");
        assert_eq!(state.advance(Ok(limited)), Step::Wait(Duration::from_secs(3)));

        let limited = RawResponse::new(429, "").with_header("Retry-After", "100");
        assert_eq!(state.advance(Ok(limited)), Step::Wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_state_transport_error_exhausted_fails() {
        let policy = instant_policy(0);
        let mut state = RetryState::new(&policy);
        assert_eq!(
            state.advance(Err(TransportError::Connect("refused".into()))),
            Step::Fail(TransportError::Connect("refused".into()))
        );
    }

    #[test]
    fn test_state_non_transient_transport_error_fails_immediately() {
        let policy = instant_policy(5);
        let mut state = RetryState::new(&policy);
        assert_eq!(
            state.advance(Err(TransportError::Request("bad body".into()))),
            Step::Fail(TransportError::Request("bad body".into()))
        );
        assert_eq!(state.attempt(), 0);
    }

    #[test]
    fn test_blocking_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut transport = MockTransport::new();
        transport.expect_send().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(RawResponse::new(500, "oops"))
            } else {
                Ok(RawResponse::new(200, "ok"))
            }
        });

        let response = execute_blocking(&transport, &instant_policy(3), &request()).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_blocking_exhaustion_returns_last_response() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(5)
            .returning(|_| Ok(RawResponse::new(503, "unavailable")));

        let response = execute_blocking(&transport, &instant_policy(4), &request()).unwrap();

        assert_eq!(response.status, 503);
    }

    #[test]
    fn test_blocking_does_not_retry_not_found() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(RawResponse::new(404, "")));

        let response = execute_blocking(&transport, &instant_policy(3), &request()).unwrap();

        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_blocking_transport_error_reraised_after_retries() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(3)
            .returning(|_| Err(TransportError::Connect("refused".into())));

        let err = execute_blocking(&transport, &instant_policy(2), &request()).unwrap_err();

        assert_eq!(err, TransportError::Connect("refused".into()));
    }

    #[test]
    fn test_blocking_recovers_from_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut transport = MockTransport::new();
        transport.expect_send().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Timeout("slow".into()))
            } else {
                Ok(RawResponse::new(200, "ok"))
            }
        });

        let response = execute_blocking(&transport, &instant_policy(1), &request()).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_async_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut transport = MockAsyncTransport::new();
        transport.expect_send().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Ok(RawResponse::new(502, ""))
            } else {
                Ok(RawResponse::new(200, "ok"))
            }
        });

        let response = execute(&transport, &instant_policy(3), &request())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_async_exhaustion_makes_max_plus_one_calls() {
        let mut transport = MockAsyncTransport::new();
        transport
            .expect_send()
            .times(3)
            .returning(|_| Ok(RawResponse::new(503, "")));

        let response = execute(&transport, &instant_policy(2), &request())
            .await
            .unwrap();

        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_async_does_not_retry_client_errors() {
        for status in [400, 401, 403, 404, 422] {
            let mut transport = MockAsyncTransport::new();
            transport
                .expect_send()
                .times(1)
                .returning(move |_| Ok(RawResponse::new(status, "")));

            let response = execute(&transport, &instant_policy(3), &request())
                .await
                .unwrap();
            assert_eq!(response.status, status);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_waits_for_backoff() {
        let policy = RetryPolicy::default()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_secs(1))
            .with_jitter(0.0);
        let mut transport = MockAsyncTransport::new();
        transport
            .expect_send()
            .times(3)
            .returning(|_| Err(TransportError::Timeout("slow".into())));

        let start = tokio::time::Instant::now();
        let err = execute(&transport, &policy, &request()).await.unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
        // 1s + 2s of backoff on the paused clock
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_waits_for_retry_after() {
        let policy = RetryPolicy::default().with_max_retries(1).with_jitter(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut transport = MockAsyncTransport::new();
        transport.expect_send().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(RawResponse::new(429, "").with_header("Retry-After", "7"))
            } else {
                Ok(RawResponse::new(200, "{}"))
            }
        });

        let start = tokio::time::Instant::now();
        let response = execute(&transport, &policy, &request()).await.unwrap();

        assert_eq!(response.status, 200);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(7100), "elapsed {:?}", elapsed);
    }
}
