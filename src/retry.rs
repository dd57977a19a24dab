use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

/// How hard to try a model call before settling for the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Per-attempt bound; an elapsed attempt counts as a failed one.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            attempts: 1,
            timeout: None,
        }
    }

    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Invoke `call` until `accept` maps its text to a value, or the policy runs
/// out. Errors, timeouts and rejected output are all absorbed here; the
/// caller only ever sees an accepted value or `fallback`.
pub async fn invoke_with_fallback<T, F, Fut, A>(
    label: &str,
    policy: RetryPolicy,
    fallback: T,
    mut call: F,
    accept: A,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
    A: Fn(&str) -> Option<T>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let result = match policy.timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
            },
            None => call().await,
        };

        match result {
            Ok(text) => match accept(&text) {
                Some(value) => {
                    debug!(label, attempt, "model output accepted");
                    return value;
                }
                None => {
                    let preview: String = text.chars().take(80).collect();
                    warn!(label, attempt, attempts, output = %preview, "model output rejected");
                }
            },
            Err(e) => warn!(label, attempt, attempts, error = %e, "model call failed"),
        }
    }

    debug!(label, "falling back");
    fallback
}
