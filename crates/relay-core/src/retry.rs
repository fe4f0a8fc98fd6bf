// Retry / partial-output guard
//
// Wraps streaming attempts in a bounded retry loop with exponential
// backoff. The one hard rule: once any delta has escaped to the caller,
// nothing may be retried - a second attempt would duplicate the prefix the
// caller already saw.

use std::future::Future;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use tracing::{error, warn};

use crate::delta::{Delta, ErrorDelta};
use crate::error::{ErrorCode, ProviderFailure};
use crate::stream::{
    drive_attempt, AttemptEnd, AttemptItem, DeltaStream, PartStream, SignatureSink, STREAM_TIMEOUT,
};

/// Total attempts per request, first try included.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff base in seconds; delays run `base^attempt` = 1, 2, 4.
pub const RETRY_BACKOFF_BASE_SECS: u64 = 2;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub stream_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_base_secs: RETRY_BACKOFF_BASE_SECS,
            stream_timeout: STREAM_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.pow(attempt))
    }
}

/// Run up to `policy.max_attempts` streaming attempts, opening a fresh
/// upstream stream via `open` for each.
///
/// Rules, in order:
/// - attempt completed: emit the final marker and stop;
/// - retryable end with zero deltas emitted this request: back off, retry;
/// - retryable end after any delta escaped: emit *partial_stream_error*;
/// - fatal end or failed `open`: surface the failure's own code;
/// - attempts exhausted: emit *max_retries* with the last reason.
pub fn generate_with_retries<F, Fut>(
    request_id: String,
    policy: RetryPolicy,
    signatures: Option<SignatureSink>,
    open: F,
) -> DeltaStream
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<PartStream, ProviderFailure>> + Send,
{
    Box::pin(stream! {
        let mut emitted = 0usize;
        let mut last_reason = String::new();

        for attempt in 0..policy.max_attempts {
            let parts = match open().await {
                Ok(parts) => parts,
                Err(failure) => {
                    error!(request_id, error = %failure, "provider call failed");
                    yield Delta::Error(failure.into());
                    return;
                }
            };

            let mut items = Box::pin(drive_attempt(
                parts,
                policy.stream_timeout,
                signatures.clone(),
            ));
            let end = loop {
                match items.next().await {
                    Some(AttemptItem::Delta(delta)) => {
                        emitted += 1;
                        yield delta;
                    }
                    Some(AttemptItem::End(end)) => break end,
                    None => break AttemptEnd::Completed,
                }
            };

            match end {
                AttemptEnd::Completed => {
                    yield Delta::Final;
                    return;
                }
                AttemptEnd::Retryable(reason) => {
                    if emitted > 0 {
                        warn!(
                            request_id,
                            chunks = emitted,
                            reason,
                            "retryable failure after partial output, cannot retry safely"
                        );
                        yield Delta::Error(ErrorDelta {
                            message: format!(
                                "Stream failed after partial output ({emitted} chunks): {reason}"
                            ),
                            code: ErrorCode::PartialStreamError,
                            retryable: false,
                        });
                        return;
                    }
                    warn!(
                        request_id,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        reason,
                        "retryable failure, backing off"
                    );
                    last_reason = reason;
                    if attempt + 1 < policy.max_attempts {
                        tokio::time::sleep(policy.backoff(attempt)).await;
                    }
                }
                AttemptEnd::Fatal(failure) => {
                    error!(request_id, error = %failure, "non-retryable provider failure");
                    yield Delta::Error(ErrorDelta {
                        message: format!("Generation failed: {}", failure.message),
                        code: failure.code,
                        retryable: false,
                    });
                    return;
                }
            }
        }

        yield Delta::Error(ErrorDelta {
            message: format!(
                "Generation failed after {} retries: {last_reason}",
                policy.max_attempts
            ),
            code: ErrorCode::MaxRetries,
            retryable: false,
        });
    })
}
