//! Narrative per-capability output instead of a comparison report

use agent_core::Model;
use anyhow::Result;

use crate::registry::TestCase;
use crate::runner::display_duration;

/// Primary model runs the cases; the second model (if any) scores them
pub async fn run_evaluation_mode(models: &[Model], cases: &[TestCase]) -> Result<()> {
    println!("🔍 Running in Evaluation Mode");
    println!("{}", "=".repeat(41));

    let Some(primary) = models.first() else {
        println!("❌ Evaluation mode requires at least 1 model");
        anyhow::bail!("Evaluation mode requires at least 1 model");
    };
    let scoring = match models.get(1) {
        Some(scoring) => {
            println!("📊 Using {} for scoring evaluations", scoring.name());
            scoring
        }
        None => {
            println!("📊 Using {} for both testing and scoring", primary.name());
            primary
        }
    };
    println!("🤖 Primary model: {}\n", primary.name());

    for case in cases {
        println!("🔬 Evaluating {}...", case.name);
        println!("{}", "-".repeat(41));

        match case.eval {
            Some(eval) => eval(primary.clone(), scoring.clone()).await,
            None => run_with_instrumentation(case, primary).await,
        }
        println!();
    }

    println!("✅ Evaluation complete!");
    Ok(())
}

async fn run_with_instrumentation(case: &TestCase, model: &Model) {
    println!("Running {} with evaluation instrumentation...", case.name);

    let outcome = (case.run)(model.clone()).await;
    match outcome.error {
        Some(e) => println!("❌ Failed: {:#}", e),
        None => {
            println!("✅ Completed in {}", display_duration(outcome.record.duration()));
            if outcome.record.is_success() {
                println!("📊 Result: Success");
            } else {
                println!("📊 Result: Failed - {}", outcome.record.error_message());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CaseOutcome, ResultRecord};
    use agent_core::ScriptedBackend;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    static EVALS: AtomicUsize = AtomicUsize::new(0);
    static RUNS: AtomicUsize = AtomicUsize::new(0);

    fn counted_run(m: Model) -> BoxFuture<'static, CaseOutcome> {
        RUNS.fetch_add(1, Ordering::SeqCst);
        async move { CaseOutcome::ok(ResultRecord::success("Plain", m.name(), Duration::ZERO, 0)) }.boxed()
    }

    fn counted_eval(primary: Model, scoring: Model) -> BoxFuture<'static, ()> {
        assert_eq!(primary.name(), "primary");
        assert_eq!(scoring.name(), "judge");
        EVALS.fetch_add(1, Ordering::SeqCst);
        async {}.boxed()
    }

    #[tokio::test]
    async fn test_custom_eval_gets_scoring_model() {
        let models = vec![
            ScriptedBackend::reply("a").into_model("primary"),
            ScriptedBackend::reply("b").into_model("judge"),
        ];
        let cases = vec![
            TestCase::new("Plain", counted_run),
            TestCase::new("Custom", counted_run).with_eval(counted_eval),
        ];

        run_evaluation_mode(&models, &cases).await.unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
        assert_eq!(EVALS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_requires_a_model() {
        assert!(run_evaluation_mode(&[], &[]).await.is_err());
    }
}
