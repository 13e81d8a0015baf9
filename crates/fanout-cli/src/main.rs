use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use fanout_core::{
    DispatchCoordinator, DispatchError, DispatchedTask, HistoryLinker, JsonRunStore,
    LogEventSink, RunOrchestrator, SystemClock, TaskExecutor, format_delta, format_duration,
};

/// Demo executor: sleeps for the task's `SLEEP_MS` and fails when `FAIL=1`.
/// Stands in for the real "run this task's payload on worker K" callback.
struct SleepExecutor;

#[async_trait]
impl TaskExecutor for SleepExecutor {
    async fn execute(&self, task: &DispatchedTask, _worker: usize) -> bool {
        let sleep_ms: u64 = task
            .environment
            .get("SLEEP_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        task.environment.get("FAIL").map(String::as_str) != Some("1")
    }
}

const DEMO_MANIFEST: &[u8] = br#"[
  {"name":"unit_tests","env":{"SLEEP_MS":"400"}},
  {"name":"integration_tests","env":{"SLEEP_MS":"900"}},
  {"name":"lint","env":{"SLEEP_MS":"150"}},
  {"name":"docs","env":{"SLEEP_MS":"250"}}
]"#;

#[tokio::main]
async fn main() -> Result<(), DispatchError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let state_dir: PathBuf = args
        .next()
        .unwrap_or_else(|| "fanout-runs".to_string())
        .into();
    let manifest: Vec<u8> = match args.next() {
        Some(path) => std::fs::read(path)?,
        None => DEMO_MANIFEST.to_vec(),
    };
    let workers: usize = args.next().and_then(|v| v.parse().ok()).unwrap_or(2);

    // (A) Store doubles as the durable run state and the history provider.
    let store = Arc::new(JsonRunStore::open(&state_dir)?);
    let run_number = store.latest_run_number()?.map_or(1, |n| n + 1);

    // (B) Wire the coordinator and orchestrator.
    let coordinator = Arc::new(DispatchCoordinator::new(
        HistoryLinker::new(store.clone()),
        store.clone(),
        Arc::new(LogEventSink),
        Arc::new(SystemClock),
    ));
    let orchestrator = RunOrchestrator::new(coordinator, Arc::new(SleepExecutor), workers);

    // (C) Ctrl-C flips the interrupt switch; the orchestrator aborts cleanly.
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    println!("run #{run_number} with {workers} workers (state in {})", state_dir.display());
    let report = orchestrator
        .run(Some(&manifest), run_number, interrupt_rx)
        .await?;

    // (D) Per-task breakdown: name, worker, outcome, duration, delta.
    println!("\nrun #{run_number}: {:?}", report.result);
    for task in &report.tasks {
        let worker = task
            .assigned_worker()
            .map_or("-".to_string(), |w| w.to_string());
        let duration = task
            .duration()
            .map_or("-".to_string(), format_duration);
        let delta = task
            .duration_delta()
            .map_or(String::new(), |d| format!(" ({})", format_delta(d)));
        println!(
            "  {:<20} worker {:<3} {:<10} {}{}",
            task.name(),
            worker,
            format!("{:?}", task.outcome()),
            duration,
            delta
        );
    }

    Ok(())
}
