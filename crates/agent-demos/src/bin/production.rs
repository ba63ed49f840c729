//! Production patterns: tool failures, persisted traces, call caps, retries,
//! environment-driven logging and session cancellation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_core::{Agent, Model, Session, Trace};
use agent_demos::tools::{check_status_tool, fetch_data_tool, flaky_service_tool, generate_number_tool};
use agent_demos::{block_on, connect, init_from_env, DEFAULT_MODEL};
use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "production", about = "Error handling and operational patterns")]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Cancel the session in the cancellation example after this many milliseconds
    #[arg(long, default_value_t = 500)]
    cancel_after_ms: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = init_from_env();
    debug!(level, "Logging initialised from ENV");
    block_on(run(cli, level))?
}

fn section(title: &str) {
    println!("\n=== {} ===", title);
}

async fn tool_error_recovery(model: &Model) {
    section("1. Tool Error Recovery");
    let agent = Agent::new("StatusChecker")
        .with_model(model.clone())
        .with_instructions(
            "Check the status of the requested services. If a check fails, report the error \
             and continue with the remaining services.",
        )
        .with_tool(check_status_tool());

    match agent.execute("Check the status of the database, api and cache services.").await {
        Ok(response) => println!("Response: {}", response),
        Err(e) => error!("Status check failed: {:#}", e),
    }
}

async fn persisted_trace(model: &Model) -> Result<()> {
    section("2. Trace Persistence");
    let session = Session::new();
    let trace = Trace::for_session(&session);
    let agent = Agent::new("TracedAgent")
        .with_model(model.clone())
        .with_instructions("Use the generate_number tool when asked for a number.")
        .with_tool(generate_number_tool())
        .with_session(session)
        .with_trace(trace.clone());

    if let Err(e) = agent.execute("Give me a number, then tell me whether it is even.").await {
        warn!("Traced run failed: {:#}", e);
    }
    let path = trace.save(Trace::default_dir())?;
    println!("Recorded {} trace entries, saved to {}", trace.len(), path.display());
    Ok(())
}

async fn call_cap(model: &Model) {
    section("3. Max LLM Calls");
    let agent = Agent::new("CappedAgent")
        .with_model(model.clone())
        .with_instructions("Call generate_number repeatedly until you get a number above 95.")
        .with_tool(generate_number_tool())
        .with_max_iterations(3);

    match agent.execute("Find me a number above 95.").await {
        Ok(response) => println!("Response: {}", response),
        Err(e) => println!("Stopped by the cap: {}", e),
    }
}

async fn retries(model: &Model) {
    section("4. Retries");
    let calls = Arc::new(AtomicUsize::new(0));
    let agent = Agent::new("RetryingAgent")
        .with_model(model.clone())
        .with_instructions("Call flaky_service. If it fails, try it again.")
        .with_tool(flaky_service_tool(calls.clone()))
        .with_retries(3);

    match agent.execute("Call the flaky service and report its answer.").await {
        Ok(response) => println!("Response: {}", response),
        Err(e) => error!("Flaky service run failed: {:#}", e),
    }
    println!("flaky_service was called {} times", calls.load(Ordering::SeqCst));
}

fn log_levels(level: &str) {
    section("5. Log Levels From ENV");
    println!("ENV={} selects default level '{}'", std::env::var("ENV").unwrap_or_default(), level);
    println!("RUST_LOG, when set, overrides it");
    debug!("debug is visible");
    info!("info is visible");
    warn!("warn is visible");
}

async fn cancellation(model: &Model, cancel_after: Duration) {
    section("6. Session Cancellation");
    let session = Session::new();
    let agent = Agent::new("DataAgent")
        .with_model(model.clone())
        .with_instructions("Fetch each requested dataset with fetch_data, one call per dataset.")
        .with_tool(fetch_data_tool(session.clone()))
        .with_session(session.clone());

    let canceller = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(cancel_after).await;
        canceller.cancel();
    });

    let outcome = match agent.start("Fetch user activity, orders, refunds and inventory for the last 30 days.") {
        Ok(run) => run.wait(Some(Duration::from_secs(30))).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(response) => println!("Finished before cancellation: {}", response),
        Err(e) if session.is_cancelled() => println!("Cancelled: {}", e),
        Err(e) => error!("Data run failed: {:#}", e),
    }
}

async fn comprehensive(model: &Model) -> Result<()> {
    section("7. Comprehensive Setup");
    let session = Session::new();
    let trace = Trace::for_session(&session);
    let agent = Agent::new("ProductionAgent")
        .with_model(model.clone())
        .with_description("Operations assistant")
        .with_instructions("Check service health and summarise the results for an on-call engineer.")
        .with_tool(check_status_tool())
        .with_session(session.clone())
        .with_trace(trace.clone())
        .with_max_iterations(5)
        .with_retries(2);

    let outcome = agent
        .start("Check the api and cache services and summarise.")?
        .wait(Some(Duration::from_secs(60)))
        .await;
    match outcome {
        Ok(response) => println!("Response: {}", response),
        Err(e) => error!(session = session.id(), "Production run failed: {:#}", e),
    }
    let path = trace.save(Trace::default_dir())?;
    println!("Trace saved to {}", path.display());
    Ok(())
}

async fn run(cli: Cli, level: &str) -> Result<()> {
    let model = connect(&cli.model)?;

    println!("🏭 Production Patterns");
    println!("======================");

    tool_error_recovery(&model).await;
    persisted_trace(&model).await?;
    call_cap(&model).await;
    retries(&model).await;
    log_levels(level);
    cancellation(&model, Duration::from_millis(cli.cancel_after_ms)).await;
    comprehensive(&model).await?;

    println!("\n✅ Production examples finished");
    Ok(())
}
