//! Run command - drive a synthetic market-data workload through the engine
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 4 producers, 500000 records of each type per producer
//! tickline run
//!
//! # Smaller run, JSON summary
//! tickline run --producers 2 --records 10000 --json
//! ```

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tickline_config::EngineConfig;
use tickline_engine::{Engine, EngineMetrics, Record, StopReport};
use tickline_metrics::{EngineMetricsProvider, MetricsReporter};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::LoadedConfig;
use crate::records::{BasicDataMessage, OrderBookMessage, RECORD_TYPES};
use crate::store::{InstrumentStore, InstrumentSummary};
use crate::workload::{DEFAULT_SYMBOLS, Workload, WorkloadReport};

const DEFAULT_PRODUCERS: usize = 4;
const DEFAULT_RECORDS: u64 = 500_000;

/// Run command arguments
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Number of producer threads
    #[arg(short, long, default_value_t = DEFAULT_PRODUCERS)]
    pub producers: usize,

    /// Records of each type appended by every producer
    #[arg(short = 'n', long, default_value_t = DEFAULT_RECORDS)]
    pub records: u64,

    /// Comma-separated instrument ids to cycle through
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_SYMBOLS)]
    pub symbols: Vec<String>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            producers: DEFAULT_PRODUCERS,
            records: DEFAULT_RECORDS,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            json: false,
        }
    }
}

/// Final numbers for one run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub producers: usize,
    pub workload: WorkloadReport,
    pub records_flushed: u64,
    pub rotations: u64,
    pub elapsed_ms: u64,
    pub records_per_sec: f64,
    /// Data points the consumers wrote to the instrument store
    pub points_stored: usize,
    pub instruments: Vec<InstrumentSummary>,
}

impl RunSummary {
    fn new(
        producers: usize,
        workload: WorkloadReport,
        stop: &StopReport,
        metrics: &EngineMetrics,
        store: &InstrumentStore,
        elapsed: Duration,
    ) -> Self {
        let records_flushed = stop.records_flushed();
        let secs = elapsed.as_secs_f64();
        Self {
            producers,
            workload,
            records_flushed,
            rotations: metrics.rotations(),
            elapsed_ms: elapsed.as_millis() as u64,
            records_per_sec: if secs > 0.0 {
                records_flushed as f64 / secs
            } else {
                0.0
            },
            points_stored: store.total(),
            instruments: store.summary(),
        }
    }

    fn print_human(&self) {
        println!("producers        {}", self.producers);
        println!("records stored   {}", self.workload.stored);
        println!("records dropped  {}", self.workload.dropped);
        println!("full retries     {}", self.workload.full_retries);
        println!("records flushed  {}", self.records_flushed);
        println!("rotations        {}", self.rotations);
        println!("points stored    {}", self.points_stored);
        println!(
            "elapsed          {}ms ({:.0} records/s)",
            self.elapsed_ms, self.records_per_sec
        );
        println!();
        for instrument in &self.instruments {
            match instrument.last_price {
                Some(price) => println!(
                    "  {:<8} {:>10} points  last {:.2}",
                    instrument.instrument, instrument.points, price
                ),
                None => println!("  {:<8} {:>10} points", instrument.instrument, instrument.points),
            }
        }
    }
}

/// Build an engine whose consumers write into `store`
pub fn build_engine(
    config: &EngineConfig,
    store: &Arc<InstrumentStore>,
    metrics: Arc<EngineMetrics>,
) -> Result<Engine> {
    let order_books = Arc::clone(store);
    let basic_data = Arc::clone(store);

    Engine::builder(config.clone())
        .metrics(metrics)
        .register::<OrderBookMessage, _>(move |batch: &[OrderBookMessage]| {
            order_books.record_batch(
                OrderBookMessage::NAME,
                batch.iter().map(|m| (m.symbol.as_str(), m.price)),
            );
        })
        .register::<BasicDataMessage, _>(move |batch: &[BasicDataMessage]| {
            basic_data.record_batch(
                BasicDataMessage::NAME,
                batch.iter().map(|m| (m.symbol.as_str(), m.price)),
            );
        })
        .build()
        .context("failed to build engine")
}

/// Run the workload until it finishes or Ctrl+C
pub async fn run(args: RunArgs, loaded: LoadedConfig) -> Result<()> {
    let config = &loaded.config;
    config
        .check_record_types(&RECORD_TYPES)
        .context("invalid [engine.lines] configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %loaded.source(),
        producers = args.producers,
        records = args.records,
        "tickline starting"
    );

    let workload = Workload::new(args.producers, args.records, args.symbols)?;
    let store = Arc::new(InstrumentStore::new());
    let metrics = Arc::new(EngineMetrics::new());
    let engine = build_engine(&config.engine, &store, Arc::clone(&metrics))?;

    let cancel = CancellationToken::new();
    let metrics_task = if config.metrics.enabled {
        let provider: Arc<dyn EngineMetricsProvider> = metrics.clone();
        let reporter = MetricsReporter::new(config.metrics.clone(), provider);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move { reporter.run(cancel).await }))
    } else {
        None
    };

    engine.start().context("failed to start flush driver")?;
    let started = Instant::now();

    let stop = workload.stop_handle();
    let producer = engine.producer();
    let runner = workload.clone();
    let mut producers = tokio::task::spawn_blocking(move || runner.run(&producer));

    let report = tokio::select! {
        joined = &mut producers => joined.context("workload task failed")?,
        _ = wait_for_shutdown() => {
            info!("shutdown signal received, stopping producers...");
            stop.store(true, Ordering::Relaxed);
            producers.await.context("workload task failed")?
        }
    };

    // Stop the engine before surfacing a workload error so buffered records
    // still reach the store
    let stopped = engine.stop().context("engine stop failed");
    let elapsed = started.elapsed();

    cancel.cancel();
    if let Some(task) = metrics_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "metrics reporter task failed");
    }

    let report = report?;
    let stopped = stopped?;

    let summary = RunSummary::new(
        args.producers,
        report,
        &stopped,
        &metrics,
        &store,
        elapsed,
    );

    info!(
        stored = report.stored,
        flushed = summary.records_flushed,
        planned = workload.planned(),
        elapsed_ms = summary.elapsed_ms,
        "tickline finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_human();
    }
    Ok(())
}

/// Wait for Ctrl+C
async fn wait_for_shutdown() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C, running to completion");
        std::future::pending::<()>().await;
    }
}
