//! Sequential execution of the model × test case matrix

use std::time::Duration;

use agent_core::Model;
use anyhow::Result;
use tracing::{info, warn};

use crate::record::{CaseOutcome, ResultRecord};
use crate::registry::TestCase;

/// Records for one model, in test case order
#[derive(Debug, Clone)]
pub struct ModelResults {
    pub model: String,
    pub records: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultMatrix {
    rows: Vec<ModelResults>,
}

impl ResultMatrix {
    pub fn new(rows: Vec<ModelResults>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ModelResults] {
        &self.rows
    }

    /// All records, model by model
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.rows.iter().flat_map(|r| r.records.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.records.is_empty())
    }
}

/// `{:?}`-style duration used on the progress lines
pub fn display_duration(d: Duration) -> String {
    format!("{:.2?}", d)
}

pub struct Runner {
    models: Vec<Model>,
    cases: Vec<TestCase>,
}

impl Runner {
    pub fn new(models: Vec<Model>, cases: Vec<TestCase>) -> Result<Self> {
        if models.is_empty() {
            anyhow::bail!("No valid models specified");
        }
        if cases.is_empty() {
            anyhow::bail!("No test cases selected");
        }
        Ok(Self { models, cases })
    }

    /// Every case against every model; failures are recorded, never propagated
    pub async fn run(&self) -> ResultMatrix {
        let mut rows = Vec::with_capacity(self.models.len());

        for model in &self.models {
            println!("\n🤖 Testing {}", model.name());
            println!("{}", "-".repeat(31));
            info!(model = model.name(), provider = model.provider(), "Testing model");

            let mut records = Vec::with_capacity(self.cases.len());
            for case in &self.cases {
                print!("  {}... ", case.name);
                flush_stdout();

                let outcome = (case.run)(model.clone()).await;
                if let Some(e) = &outcome.error {
                    warn!(case = case.name, model = model.name(), error = %e, "Test case failed");
                }
                println!("{}", progress_status(&outcome));
                records.push(outcome.record);
            }

            rows.push(ModelResults {
                model: model.name().to_string(),
                records,
            });
        }

        ResultMatrix::new(rows)
    }
}

/// Progress verdict; an unsuccessful record fails even without an error value
pub fn progress_status(outcome: &CaseOutcome) -> String {
    let duration = display_duration(outcome.record.duration());
    if outcome.is_failure() {
        format!("❌ FAILED ({})", duration)
    } else {
        format!("✅ SUCCESS ({})", duration)
    }
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ScriptedBackend;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    fn case_a(m: Model) -> BoxFuture<'static, CaseOutcome> {
        async move {
            CaseOutcome::ok(ResultRecord::success("A", m.name(), Duration::from_secs(1), 2))
        }
        .boxed()
    }

    fn case_b(m: Model) -> BoxFuture<'static, CaseOutcome> {
        async move {
            let record = ResultRecord::failure("B", m.name(), Duration::from_secs(2), 0, "boom");
            CaseOutcome::err(record, anyhow::anyhow!("boom"))
        }
        .boxed()
    }

    fn model(name: &str) -> Model {
        ScriptedBackend::reply("unused").into_model(name)
    }

    #[test]
    fn test_rejects_empty_inputs() {
        assert!(Runner::new(vec![], vec![TestCase::new("A", case_a)]).is_err());
        assert!(Runner::new(vec![model("M")], vec![]).is_err());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_batch() {
        let runner = Runner::new(
            vec![model("M")],
            vec![TestCase::new("A", case_a), TestCase::new("B", case_b)],
        )
        .unwrap();
        let matrix = runner.run().await;

        let records: Vec<&ResultRecord> = matrix.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].test_case(), "A");
        assert!(records[0].is_success());
        assert_eq!(records[0].duration(), Duration::from_secs(1));
        assert_eq!(records[0].error_message(), "");
        assert_eq!(records[1].test_case(), "B");
        assert!(!records[1].is_success());
        assert_eq!(records[1].duration(), Duration::from_secs(2));
        assert_eq!(records[1].error_message(), "boom");
    }

    #[tokio::test]
    async fn test_every_model_is_attempted() {
        let runner = Runner::new(
            vec![model("M1"), model("M2")],
            vec![TestCase::new("B", case_b), TestCase::new("A", case_a)],
        )
        .unwrap();
        let matrix = runner.run().await;

        let models: Vec<&str> = matrix.rows().iter().map(|r| r.model.as_str()).collect();
        assert_eq!(models, vec!["M1", "M2"]);
        assert!(matrix.rows().iter().all(|r| r.records.len() == 2));
        assert_eq!(matrix.rows()[1].records[1].model_name(), "M2");
    }

    #[test]
    fn test_display_duration() {
        assert_eq!(display_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_failed_record_without_error_shows_failure() {
        let record = ResultRecord::failure("B", "M", Duration::from_millis(700), 0, "soft failure");
        let outcome = CaseOutcome::ok(record);
        assert!(outcome.error.is_none());
        assert_eq!(progress_status(&outcome), "❌ FAILED (700.00ms)");

        let ok = CaseOutcome::ok(ResultRecord::success("A", "M", Duration::from_secs(1), 3));
        assert_eq!(progress_status(&ok), "✅ SUCCESS (1.00s)");
    }
}
