//! Stage results that never abort the pipeline.
//!
//! Every extraction stage produces a usable value. When something went wrong
//! the stage still hands back a structurally valid fallback (empty text, empty
//! mapping, all-null series) together with the reason, so the failure stays
//! observable to callers and tests instead of disappearing into a log line.

use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    /// Builds a degraded outcome and records the reason in the log.
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("{}", reason);
        Outcome::Degraded { value, reason }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_ok()
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded { value, reason } => Outcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }

    /// Splits the outcome, pushing the degradation reason (if any) onto `log`.
    pub fn collect_into(self, log: &mut Vec<Degradation>, stage: &str) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Degraded { value, reason } => {
                log.push(Degradation {
                    stage: stage.to_string(),
                    reason,
                });
                value
            }
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Converts a hard error into a degraded default value.
    pub fn from_result<E: std::fmt::Display>(
        result: std::result::Result<T, E>,
        context: &str,
    ) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::degraded(T::default(), format!("{}: {}", context, e)),
        }
    }
}

/// A degradation observed while serving one request.
#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
pub struct Degradation {
    pub stage: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_keeps_fallback_value() {
        let outcome: Outcome<String> = Outcome::degraded(String::new(), "file unreadable");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reason(), Some("file unreadable"));
        assert_eq!(outcome.into_value(), "");
    }

    #[test]
    fn test_from_result_uses_default_on_error() {
        let failed: std::result::Result<Vec<u8>, String> = Err("boom".to_string());
        let outcome = Outcome::from_result(failed, "loading bytes");
        assert_eq!(outcome.reason(), Some("loading bytes: boom"));
        assert!(outcome.value().is_empty());

        let ok: std::result::Result<Vec<u8>, String> = Ok(vec![1]);
        assert_eq!(Outcome::from_result(ok, "loading bytes"), Outcome::Ok(vec![1]));
    }

    #[test]
    fn test_collect_into_records_stage() {
        let mut log = Vec::new();
        let value = Outcome::degraded(0_u32, "missing column").collect_into(&mut log, "align");
        assert_eq!(value, 0);
        assert_eq!(
            log,
            vec![Degradation {
                stage: "align".to_string(),
                reason: "missing column".to_string()
            }]
        );

        let value = Outcome::Ok(7_u32).collect_into(&mut log, "chart");
        assert_eq!(value, 7);
        assert_eq!(log.len(), 1);
    }
}
