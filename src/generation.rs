//! Narrative generation seam and its bounded retry loop.

use log::{info, warn};
use std::future::Future;
use std::path::Path;
use tokio::time::sleep;

use crate::config::RetryPolicy;
use crate::error::{InsightsError, Result};

/// Turns a rendered prompt (plus an optional document attachment) into text.
pub trait TextGenerator {
    fn generate(
        &self,
        prompt: &str,
        attachment: Option<&Path>,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Calls `generator` up to `policy.max_attempts` times, sleeping
/// `policy.delay()` between failed attempts.
///
/// A blank prompt is rejected before any call is made.
pub async fn generate_with_retry<G>(
    generator: &G,
    prompt: &str,
    attachment: Option<&Path>,
    policy: &RetryPolicy,
) -> Result<String>
where
    G: TextGenerator,
{
    if prompt.trim().is_empty() {
        return Err(InsightsError::EmptyPrompt);
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        info!("Calling text generator (attempt {}/{})", attempt, max_attempts);
        match generator.generate(prompt, attachment).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(
                    "Text generation failed (attempt {}/{}): {}",
                    attempt, max_attempts, e
                );
                last_error = e.to_string();
                if attempt < max_attempts {
                    sleep(policy.delay()).await;
                }
            }
        }
    }

    Err(InsightsError::Generation {
        attempts: max_attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
        seen_attachment: Mutex<Option<String>>,
    }

    impl Flaky {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(times),
                calls: AtomicU32::new(0),
                seen_attachment: Mutex::new(None),
            }
        }
    }

    impl TextGenerator for Flaky {
        async fn generate(&self, prompt: &str, attachment: Option<&Path>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_attachment.lock().unwrap() = attachment.map(|p| p.display().to_string());
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(std::io::Error::other("service unavailable").into());
            }
            Ok(format!("narrative for: {}", prompt))
        }
    }

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let generator = Flaky::failing(2);
        let text = generate_with_retry(&generator, "prompt", None, &no_delay(5))
            .await
            .unwrap();
        assert_eq!(text, "narrative for: prompt");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let generator = Flaky::failing(10);
        let err = generate_with_retry(&generator, "prompt", None, &no_delay(3))
            .await
            .unwrap_err();
        match err {
            InsightsError::Generation { attempts, message } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("service unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected_without_call() {
        let generator = Flaky::failing(0);
        let err = generate_with_retry(&generator, "  \n", None, &no_delay(5))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightsError::EmptyPrompt));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attachment_is_forwarded() {
        let generator = Flaky::failing(0);
        generate_with_retry(&generator, "p", Some(Path::new("data/report.pdf")), &no_delay(1))
            .await
            .unwrap();
        assert_eq!(
            generator.seen_attachment.lock().unwrap().as_deref(),
            Some("data/report.pdf")
        );
    }
}
