use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use transcribe_gateway::batch::{BatchOrchestrator, JobRegistry};
use transcribe_gateway::config::ConfigSet;
use transcribe_gateway::engine::{MockBatchRecognizer, MockBlobStore, MockRecognizer};
use transcribe_gateway::server;
use transcribe_gateway::streaming::SessionManager;

#[tokio::main]
async fn main() {
    init_tracing();

    match ConfigSet::load_from_env() {
        Ok(config) => {
            info!(root = ?config.root(), "configuration loaded");

            // 認識エンジンとブロブストアは外部連携点。ここではモックを結線する
            let blobs = Arc::new(MockBlobStore::default());
            let manager = Arc::new(SessionManager::new(
                Arc::new(MockRecognizer),
                blobs.clone(),
                config.streaming.clone(),
            ));

            let job_registry = Arc::new(JobRegistry::new());
            let orchestrator = BatchOrchestrator::new(
                Arc::new(MockBatchRecognizer::completes_after(2, "mock transcript")),
                blobs,
                job_registry.clone(),
                config.batch.clone(),
            );

            // 保持期間が設定されていれば終端ジョブを定期的に掃除
            if let Some(retention) = config.batch.finished_job_retention() {
                let registry = job_registry.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(retention);
                    loop {
                        ticker.tick().await;
                        let removed = registry.prune_finished(retention);
                        if removed > 0 {
                            info!(removed, "pruned finished jobs");
                        }
                    }
                });
            }

            info!(
                frame_queue = config.streaming.frame_queue_capacity,
                poll_interval_ms = config.batch.poll_interval_ms,
                "transcription gateway initialized"
            );

            let ws_addr = config.server.ws_bind_addr.clone();
            info!(addr = %ws_addr, "starting realtime transcription server");
            if let Err(e) = server::bind_and_run(&ws_addr, manager).await {
                error!(error = %e, "failed to start server");
                std::process::exit(1);
            }

            let _ = orchestrator;
        }
        Err(err) => {
            error!(error = ?err, "failed to load configuration");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
