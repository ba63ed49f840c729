//! Outcome of running one test case against one model

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use agent_core::Model;
use serde::{Serialize, Serializer};
use serde_json::Value;

const MISSING_ERROR: &str = "test case failed without an error message";

fn duration_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Immutable once built.
///
/// A record is either a success with an empty error message or a failure with
/// a non-empty one; the constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    test_case: String,
    model_name: String,
    success: bool,
    #[serde(rename = "duration_secs", serialize_with = "duration_secs")]
    duration: Duration,
    response_size: usize,
    error_message: String,
    metadata: BTreeMap<String, Value>,
}

impl ResultRecord {
    fn build(
        test_case: &str,
        model_name: &str,
        duration: Duration,
        response_size: usize,
        error: Option<String>,
    ) -> Self {
        let (success, error_message) = match error {
            None => (true, String::new()),
            Some(msg) if msg.trim().is_empty() => (false, MISSING_ERROR.to_string()),
            Some(msg) => (false, msg),
        };
        Self {
            test_case: test_case.to_string(),
            model_name: model_name.to_string(),
            success,
            duration,
            response_size,
            error_message,
            metadata: BTreeMap::new(),
        }
    }

    pub fn success(test_case: &str, model_name: &str, duration: Duration, response_size: usize) -> Self {
        Self::build(test_case, model_name, duration, response_size, None)
    }

    pub fn failure(
        test_case: &str,
        model_name: &str,
        duration: Duration,
        response_size: usize,
        error: impl Into<String>,
    ) -> Self {
        Self::build(test_case, model_name, duration, response_size, Some(error.into()))
    }

    /// Same record, marked failed with `error`
    pub fn into_failure(self, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            error_message: if error.trim().is_empty() {
                MISSING_ERROR.to_string()
            } else {
                error
            },
            ..self
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn test_case(&self) -> &str {
        &self.test_case
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn response_size(&self) -> usize {
        self.response_size
    }

    /// Empty on success
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}

/// What a test case callable hands back to the runner.
///
/// `error` is informational: the record is kept either way.
#[derive(Debug)]
pub struct CaseOutcome {
    pub record: ResultRecord,
    pub error: Option<anyhow::Error>,
}

impl CaseOutcome {
    /// Finished without a hard error (the record may still be a failure)
    pub fn ok(record: ResultRecord) -> Self {
        Self { record, error: None }
    }

    pub fn err(record: ResultRecord, error: anyhow::Error) -> Self {
        Self {
            record,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some() || !self.record.is_success()
    }
}

/// Starts the clock for one test case and stamps records with its identity
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    test_case: &'static str,
    model_name: String,
    started: Instant,
}

impl RecordBuilder {
    pub fn start(test_case: &'static str, model: &Model) -> Self {
        Self {
            test_case,
            model_name: model.name().to_string(),
            started: Instant::now(),
        }
    }

    pub fn ok(&self, response: &str) -> ResultRecord {
        ResultRecord::success(
            self.test_case,
            &self.model_name,
            self.started.elapsed(),
            response.len(),
        )
    }

    pub fn fail(&self, response: &str, error: impl Into<String>) -> ResultRecord {
        ResultRecord::failure(
            self.test_case,
            &self.model_name,
            self.started.elapsed(),
            response.len(),
            error,
        )
    }

    /// Hard failure: record plus the error that caused it
    pub fn error(&self, response: &str, error: anyhow::Error) -> CaseOutcome {
        let record = self.fail(response, format!("{:#}", error));
        CaseOutcome::err(record, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_has_empty_error() {
        let r = ResultRecord::success("SimpleAgent", "gpt-4o-mini", Duration::from_millis(700), 42);
        assert!(r.is_success());
        assert_eq!(r.error_message(), "");
        assert_eq!(r.response_size(), 42);
    }

    #[test]
    fn test_failure_always_explains_itself() {
        let r = ResultRecord::failure("B", "M", Duration::from_secs(2), 0, "boom");
        assert!(!r.is_success());
        assert_eq!(r.error_message(), "boom");

        let blank = ResultRecord::failure("B", "M", Duration::ZERO, 0, "  ");
        assert!(!blank.is_success());
        assert_eq!(blank.error_message(), MISSING_ERROR);

        let converted = ResultRecord::success("A", "M", Duration::ZERO, 3).into_failure("");
        assert!(!converted.is_success());
        assert!(!converted.error_message().is_empty());
    }

    #[test]
    fn test_json_shape() {
        let r = ResultRecord::success("Streaming", "qwen3:8b", Duration::from_millis(1500), 10)
            .with_metadata("chunk_count", 12)
            .with_metadata("expected_content", "paris");

        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["test_case"], json!("Streaming"));
        assert_eq!(value["model_name"], json!("qwen3:8b"));
        assert_eq!(value["duration_secs"], json!(1.5));
        assert_eq!(value["error_message"], json!(""));
        assert_eq!(value["metadata"]["chunk_count"], json!(12));
    }

    #[test]
    fn test_outcome_failure_flag() {
        let ok = CaseOutcome::ok(ResultRecord::success("A", "M", Duration::ZERO, 0));
        assert!(!ok.is_failure());

        let soft = CaseOutcome::ok(ResultRecord::failure("A", "M", Duration::ZERO, 0, "nope"));
        assert!(soft.is_failure());
    }
}
