//! Ingestion worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gist_extract::{DocumentExtractor, DocumentExtractorConfig, WebsiteConfig, WebsiteExtractor};
use gist_firestore::{FirestoreStatusRepository, StatusRepository};
use gist_media::{DownloaderChain, MediaConfig, YtDlp, YtDlpDownloader, YtDlpInfoProvider};
use gist_queue::RedisQueue;
use gist_storage::{ObjectStore, S3Client};
use gist_worker::{
    spawn_outcome_logger, BestEffortScheduler, DocumentProcessor, HttpSummaryScheduler,
    ProcessorRouter, SummaryScheduler, VideoProcessor, WebsiteProcessor, Worker, WorkerConfig,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting gist-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr.parse().context("Invalid METRICS_ADDR")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %addr, "Metrics exporter listening");
    }

    let queue = RedisQueue::from_env().context("Failed to create queue client")?;
    queue.init().await.context("Failed to initialize queues")?;
    let names = queue.config().names.clone();

    let storage = S3Client::from_env().await.context("Failed to create storage client")?;
    let status: Arc<dyn StatusRepository> = Arc::new(
        FirestoreStatusRepository::from_env()
            .await
            .context("Failed to create status repository")?,
    );

    let media_config = MediaConfig::from_env();
    let ytdlp = YtDlp::new(&media_config);
    let downloader = DownloaderChain::from_registry(
        &YtDlpDownloader::defaults(&ytdlp),
        &media_config.download_strategies,
    )
    .context("Invalid MEDIA_DOWNLOAD_STRATEGIES")?;
    info!(strategies = ?downloader.names(), "Media download chain");

    let website = WebsiteExtractor::from_config(&WebsiteConfig::from_env())
        .context("Failed to create website extractor")?;
    let documents = DocumentExtractor::new(DocumentExtractorConfig::from_env());

    let http_scheduler = HttpSummaryScheduler::from_config(&config)
        .context("Failed to create summary scheduler")?
        .map(|s| Arc::new(s) as Arc<dyn SummaryScheduler>);
    if http_scheduler.is_none() {
        info!("SUMMARY_EVENTS_URL not set; summaries will not be scheduled");
    }
    let (scheduler, outcomes) = BestEffortScheduler::new(http_scheduler, config.summary_delay_minutes);
    let outcome_logger = spawn_outcome_logger(outcomes);

    let router = ProcessorRouter::new(
        Arc::clone(&status),
        scheduler,
        Arc::new(VideoProcessor::new(
            Arc::new(YtDlpInfoProvider::new(ytdlp.clone())),
            Arc::new(downloader),
            storage.for_bucket(&config.media_bucket),
            config.work_dir.clone(),
        )),
        Arc::new(WebsiteProcessor::new(
            Arc::new(website),
            storage.for_bucket(&config.artifacts_bucket),
        )),
        Arc::new(DocumentProcessor::new(
            Arc::new(documents),
            storage.for_bucket(&config.documents_bucket),
            config.work_dir.clone(),
        )),
    );

    let worker = Worker::new(Arc::new(queue), names, Arc::new(router), status, config);
    worker.start();

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    worker.shutdown().await;
    // Dropping the worker drops the last scheduler handle and ends the logger
    drop(worker);
    outcome_logger.await.ok();

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("gist=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
