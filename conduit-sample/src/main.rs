use clap::Parser;
use conduit_core::{
    ArchivalSink, BatchSource, ProcessorConfig, Registry, StreamDriver, StreamSink,
};
use conduit_sinks::{
    FileArchivalSink, FileSinkConfig, KafkaStreamSink, MemoryArchivalSink, MemoryStreamSink,
    QueueSinkConfig,
};
use conduit_sources::{KafkaBatchSource, KafkaConfig, ReplaySource, StreamEventDecoder};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "conduit-sample",
    version,
    about = "Runs record batches through configured pipelines"
)]
struct Cli {
    /// Path to the processor JSON configuration
    #[arg(long)]
    config: PathBuf,

    /// Stream-event files to replay, one batch per file. Reads from Kafka when empty.
    #[arg(long = "events", num_args = 1..)]
    events: Vec<PathBuf>,

    /// Kafka bootstrap servers, for the source and the stream sink
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// Kafka topic to consume from
    #[arg(long, default_value = "events")]
    topic: String,

    /// Kafka consumer group
    #[arg(long, default_value = "conduit-sample")]
    group_id: String,

    /// Directory archive targets are written under
    #[arg(long, default_value = "archive")]
    archive_dir: PathBuf,

    /// Field the arrival time of each replayed record is embedded under
    #[arg(long)]
    received_at: Option<String>,

    /// Keep every write in memory and print it instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Log level (error, warn, info, debug, trace), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_writes(kind: &str, writes: Vec<conduit_sinks::SentBatch>) -> Result<(), Box<dyn Error>> {
    for write in writes {
        println!("{kind} '{}' <- {} records", write.target, write.records.len());
        for record in &write.records {
            println!("  {}", serde_json::to_string(record)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = ProcessorConfig::load(&cli.config)?;
    let mut registry = Registry::new();
    conduit_processors::register_builtins(&mut registry);

    let memory = (MemoryStreamSink::new(), MemoryArchivalSink::new());
    let (stream_sink, archival_sink): (Arc<dyn StreamSink>, Arc<dyn ArchivalSink>) = if cli.dry_run
    {
        (Arc::new(memory.0.clone()), Arc::new(memory.1.clone()))
    } else {
        (
            Arc::new(KafkaStreamSink::new(QueueSinkConfig::new(&cli.brokers))?),
            Arc::new(FileArchivalSink::new(FileSinkConfig {
                path: cli.archive_dir.clone(),
                append: false,
            })),
        )
    };

    let processor = config
        .builder(&registry)?
        .stream_sink(Arc::clone(&stream_sink))
        .archival_sink(archival_sink)
        .build()?;
    let mut driver = StreamDriver::new(Arc::new(processor));
    if let Some(quarantine) = config.quarantine(&registry, stream_sink)? {
        driver = driver.with_quarantine(quarantine);
    }

    let source: Box<dyn BatchSource> = if cli.events.is_empty() {
        info!("Consuming topic '{}' from {}", cli.topic, cli.brokers);
        Box::new(KafkaBatchSource::new(&KafkaConfig {
            bootstrap_servers: cli.brokers.clone(),
            topic: cli.topic.clone(),
            group_id: cli.group_id.clone(),
            ..KafkaConfig::default()
        })?)
    } else {
        let decoder = match &cli.received_at {
            Some(field) => StreamEventDecoder::new().with_received_at(field.clone()),
            None => StreamEventDecoder::new(),
        };
        Box::new(ReplaySource::from_files(decoder, &cli.events)?)
    };

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    let report = driver.run(source.as_ref(), shutdown_rx).await?;
    info!(
        "Processed {} batches ({} records): {} failed, {} quarantined",
        report.batches, report.records, report.failed_records, report.quarantined
    );

    if cli.dry_run {
        print_writes("stream", memory.0.batches())?;
        print_writes("archive", memory.1.batches())?;
    }
    Ok(())
}
