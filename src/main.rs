//! corpuscount CLI entry point

use anyhow::{Context, Result};
use corpuscount::config::cli::{Cli, ExecutionMode};
use corpuscount::config::toml::load_config;
use corpuscount::distributed::tcp::{CoordinatorListener, TcpGroup};
use corpuscount::distributed::worker::{report_failure, Worker};
use corpuscount::job::Job;
use corpuscount::logging::init_logging;
use corpuscount::run::{self, PreparedRun};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Launch => run_launch(cli),
        ExecutionMode::Coordinator => run_coordinator(cli),
        ExecutionMode::Worker => run_worker(cli),
        ExecutionMode::Local => run_local(cli),
    }
}

/// Validate the configuration and open the report, before any participant starts
fn prepare(cli: &Cli) -> Result<PreparedRun> {
    let config = load_config(cli)?;
    let prepared = run::prepare(config)?;
    info!("run configuration:\n{}", prepared.config());
    Ok(prepared)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}

/// Run every participant inside this process
fn run_local(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    runtime()?.block_on(run::run_in_process(config))?;
    Ok(())
}

/// Run as rank 0 and wait for externally started workers
fn run_coordinator(cli: Cli) -> Result<()> {
    let prepared = prepare(&cli)?;
    let size = prepared.config().runtime.size;
    let addr = prepared.config().runtime.coordinator_addr.clone();

    runtime()?.block_on(async {
        let listener = CoordinatorListener::bind(&addr).await?;
        println!(
            "Coordinator listening on {} (waiting for {} workers)",
            listener.local_addr()?,
            size - 1
        );

        let mut group = listener.accept_workers(size, prepared.spec()).await?;
        run::coordinate(prepared, &mut group).await
    })?;
    Ok(())
}

/// Run as a worker: connect, receive the job, count, contribute
fn run_worker(cli: Cli) -> Result<()> {
    let rank = cli.rank.context("worker mode requires --rank")?;
    let size = cli.size.context("worker mode requires --procs")?;
    let config = load_config(&cli)?;
    let addr = config.runtime.coordinator_addr.clone();
    let retry = config.runtime.connect_retry();

    runtime()?.block_on(async {
        let (mut group, spec) = TcpGroup::worker(&addr, rank, size, retry).await?;
        let job = match Job::new(spec) {
            Ok(job) => job,
            Err(e) => {
                report_failure(&mut group, &e).await;
                return Err(e);
            }
        };

        let report = Worker::new(job).run(&mut group).await?;
        debug!(rank, processed = report.processed, "worker finished");
        Ok(())
    })
}

/// Start N-1 local worker processes and act as rank 0
fn run_launch(cli: Cli) -> Result<()> {
    let prepared = prepare(&cli)?;
    let size = prepared.config().runtime.size;
    let retry = prepared.config().runtime.connect_retry();
    // Workers give up after their retry budget; so does the accept
    let accept_timeout = retry.total_wait().saturating_add(Duration::from_secs(5));

    runtime()?.block_on(async {
        let listener = CoordinatorListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();

        let mut children = Vec::with_capacity(size - 1);
        for rank in 1..size {
            match launch_local_worker(&addr, rank, size, &cli) {
                Ok(child) => children.push(child),
                Err(e) => {
                    cleanup_workers(children, false);
                    return Err(e);
                }
            }
        }

        let result = async {
            let mut group = tokio::time::timeout(accept_timeout, listener.accept_workers(size, prepared.spec()))
                .await
                .context("Timed out waiting for local workers to connect")??;
            run::coordinate(prepared, &mut group).await
        }
        .await;

        cleanup_workers(children, result.is_ok());
        result.map(|_| ())
    })
}

/// Launch one worker process of this binary
fn launch_local_worker(addr: &str, rank: usize, size: usize, cli: &Cli) -> Result<Child> {
    let exe_path = std::env::current_exe().context("Failed to get current executable path")?;

    let mut cmd = Command::new(&exe_path);
    cmd.arg("--mode").arg("worker");
    cmd.arg("--rank").arg(rank.to_string());
    cmd.arg("--procs").arg(size.to_string());
    cmd.arg("--coordinator").arg(addr);
    if let Some(attempts) = cli.connect_attempts {
        cmd.arg("--connect-attempts").arg(attempts.to_string());
    }
    if let Some(backoff) = cli.connect_backoff_ms {
        cmd.arg("--connect-backoff-ms").arg(backoff.to_string());
    }
    for _ in 0..cli.verbose {
        cmd.arg("-v");
    }

    // Workers only log; keep their stderr visible
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::inherit());

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn worker process for rank {}", rank))?;
    debug!(rank, pid = child.id(), "worker launched");

    Ok(child)
}

/// Reap worker processes
///
/// After a successful run every worker has already sent its partial and is
/// exiting; after a failure any survivor is killed.
fn cleanup_workers(children: Vec<Child>, graceful: bool) {
    for mut child in children {
        let pid = child.id();

        if graceful {
            match child.wait() {
                Ok(status) if status.success() => continue,
                Ok(status) => {
                    warn!(pid, %status, "worker exited with failure");
                    continue;
                }
                Err(e) => warn!(pid, error = %e, "failed to wait for worker"),
            }
        }

        match child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                if let Err(e) = child.kill() {
                    debug!(pid, error = %e, "worker already gone");
                }
                let _ = child.wait();
            }
        }
    }
}
