/*!
 * Havoc CLI
 *
 * Subcommands wire the in-memory backends behind the chaos proxies and run
 * the pipeline once, unleash the chaos monkey, or soak the pipeline under
 * chaos and write a resilience report.
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use havoc::{
    config::HavocConfig,
    error::{HavocError, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    monitor::{shutdown_channel, BucketMonitor, QueueMonitor},
    pipeline::ResilientPipeline,
    report::ResilienceMonitor,
};
use havoc_chaos::{ChaosInjector, ChaosMonkey, QueueProxy, ServiceKind, StoreProxy};
use havoc_core_interface::{MemoryQueue, MemoryStore, MessageQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Corruption probability `run --chaos` injects
const RUN_CHAOS_PROBABILITY: f64 = 0.3;

#[derive(Parser)]
#[command(name = "havoc")]
#[command(version, about = "Resilient pipeline and chaos harness", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once
    Run {
        /// Corrupt writes during the run
        #[arg(long)]
        chaos: bool,
    },
    /// Run randomized chaos experiments for a bounded window
    Monkey {
        /// Total run duration in seconds
        #[arg(long, default_value = "60")]
        duration: u64,

        /// Seconds each experiment is given to act
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Write the chaos report here
        #[arg(long, value_name = "PATH", default_value = "chaos_report.json")]
        report: PathBuf,
    },
    /// Soak the pipeline under chaos and write a resilience report
    Soak {
        /// Total soak duration in seconds
        #[arg(long, default_value = "60")]
        duration: u64,

        /// Seconds between pipeline iterations
        #[arg(long, default_value = "2")]
        pause: u64,

        /// Run the chaos monkey alongside the pipeline
        #[arg(long)]
        chaos: bool,

        /// Write the resilience report here
        #[arg(long, value_name = "PATH", default_value = "resilience_report.json")]
        report: PathBuf,
    },
}

struct Harness {
    pipeline: Arc<ResilientPipeline>,
    injector: Arc<ChaosInjector>,
    store: Arc<StoreProxy>,
    queue: Arc<QueueProxy>,
}

async fn build_harness(config: HavocConfig) -> anyhow::Result<Harness> {
    let store = Arc::new(StoreProxy::new(Arc::new(MemoryStore::new())));
    let queue = Arc::new(QueueProxy::new(Arc::new(MemoryQueue::new())));
    let injector = Arc::new(ChaosInjector::new(store.clone(), queue.clone()));

    let pipeline = ResilientPipeline::new(store.clone(), queue.clone(), config)
        .await
        .context("failed to set up pipeline infrastructure")?;
    Ok(Harness {
        pipeline: Arc::new(pipeline),
        injector,
        store,
        queue,
    })
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            token.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = match &cli.config {
        Some(path) => HavocConfig::load(path)?,
        None => HavocConfig::default(),
    };
    config.validate()?;

    match cli.command {
        Command::Run { chaos } => {
            let harness = build_harness(config).await?;
            if chaos {
                harness
                    .injector
                    .inject_corruption(RUN_CHAOS_PROBABILITY)
                    .await?;
            }

            let outcome = harness.pipeline.run_once().await;
            if chaos {
                harness.injector.restore(ServiceKind::Storage).await;
            }
            let drained = harness
                .pipeline
                .drain_dead_letters(Duration::from_millis(200))
                .await;

            println!(
                "run {}: {} attempts, {} records processed, {} dead letters, {:.3}s",
                if outcome.succeeded { "succeeded" } else { "failed" },
                outcome.upload_attempts,
                outcome.records_processed,
                drained,
                outcome.duration.as_secs_f64()
            );
            Ok(if outcome.succeeded {
                EXIT_SUCCESS
            } else {
                EXIT_PARTIAL
            })
        }

        Command::Monkey {
            duration,
            interval,
            report,
        } => {
            let harness = build_harness(config.clone()).await?;
            let monkey = ChaosMonkey::new(harness.injector.clone(), config.monkey.policy())?;
            let cancel = cancel_on_ctrl_c();

            let executed = monkey
                .run(
                    Duration::from_secs(duration),
                    Duration::from_secs(interval),
                    &cancel,
                )
                .await;

            let chaos_report = monkey.report();
            chaos_report.write_to(&report).map_err(HavocError::from)?;
            println!("{}", chaos_report.summary());
            println!("executed {executed} experiments, report written to {}", report.display());
            Ok(EXIT_SUCCESS)
        }

        Command::Soak {
            duration,
            pause,
            chaos,
            report,
        } => {
            let harness = build_harness(config.clone()).await?;
            let cancel = cancel_on_ctrl_c();

            // Background monitors announce new raw uploads and consume
            // pipeline events for the duration of the soak
            let (monitor_shutdown, monitor_signal) = shutdown_channel();
            let notifications = harness
                .queue
                .create_queue(&config.notification_queue)
                .await
                .context("failed to open notification queue")?;
            let bucket_task = BucketMonitor::new(
                harness.store.clone(),
                harness.queue.clone(),
                config.raw_bucket.clone(),
                notifications.clone(),
                Duration::from_secs(1),
            )
            .spawn(monitor_signal.clone());
            let queue_task =
                QueueMonitor::new(harness.queue.clone(), notifications, Duration::from_secs(1))
                    .spawn(monitor_signal);

            let monkey_task = if chaos {
                let monkey = ChaosMonkey::new(harness.injector.clone(), config.monkey.policy())?;
                let monkey_cancel = cancel.clone();
                let total = Duration::from_secs(duration);
                let interval = Duration::from_secs(pause.max(1));
                Some(tokio::spawn(async move {
                    monkey.run(total, interval, &monkey_cancel).await
                }))
            } else {
                None
            };

            let monitor = ResilienceMonitor::new(harness.pipeline.clone())
                .with_experiment_log(harness.injector.log().clone());
            let soak_report = monitor
                .run(
                    Duration::from_secs(duration),
                    Duration::from_secs(pause),
                    &cancel,
                )
                .await;

            if let Some(task) = monkey_task {
                cancel.cancel();
                let _ = task.await;
            }
            monitor_shutdown.send(true).ok();
            let _ = bucket_task.await;
            let _ = queue_task.await;
            harness.injector.restore_all().await;

            soak_report.write_to(&report)?;
            println!("{}", soak_report.summary());
            println!("report written to {}", report.display());
            Ok(EXIT_SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            let code = e
                .downcast_ref::<HavocError>()
                .map(HavocError::exit_code)
                .unwrap_or(EXIT_PARTIAL);
            std::process::exit(code);
        }
    }
}
