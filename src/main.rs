// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use gridcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use gridcrawl::config::settings::Settings;
use gridcrawl::domain::models::crawl_run::RunState;
use gridcrawl::domain::repositories::publisher::Publisher;
use gridcrawl::infrastructure::publisher::{CommandPublisher, NoopPublisher};
use gridcrawl::infrastructure::storage::{FileCheckpointStore, FileResultSink, CHECKPOINT_FILE};
use gridcrawl::sources::http_source::{HttpListingSource, HttpSourceConfig};
use gridcrawl::sources::traits::OwnerDirectory;
use gridcrawl::utils::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 主函数
///
/// 加载配置、装配各组件、执行一次运行并输出摘要
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting gridcrawl...");

    // 2. Load configuration
    let settings = Settings::new()?;
    let data_dir = settings.storage.data_path();
    info!(
        data_dir = %data_dir.display(),
        source = %settings.source.base_url,
        rows = settings.grid.rows,
        cols = settings.grid.cols,
        "Configuration loaded"
    );

    // 3. Wire collaborators
    let source = Arc::new(HttpListingSource::new(HttpSourceConfig {
        base_url: settings.source.base_url.clone(),
        timeout: Duration::from_secs(settings.source.timeout_secs),
        user_agent: settings.source.user_agent.clone(),
        api_key: settings.source.api_key.clone(),
        api_key_header: settings.source.api_key_header.clone(),
    })?);
    let owners: Option<Arc<dyn OwnerDirectory>> = settings
        .enrichment
        .enabled
        .then(|| source.clone() as Arc<dyn OwnerDirectory>);

    let checkpoint = Arc::new(FileCheckpointStore::open(data_dir.join(CHECKPOINT_FILE)).await?);
    let sink = Arc::new(FileResultSink::open(&data_dir).await?);

    let publisher: Arc<dyn Publisher> = match (&settings.publish.command, settings.publish.enabled) {
        (Some(command), true) => Arc::new(CommandPublisher::new(
            command.clone(),
            settings.publish.args.clone(),
            data_dir.clone(),
        )),
        (None, true) => {
            warn!("Publishing enabled without a command, using noop publisher");
            Arc::new(NoopPublisher)
        }
        _ => Arc::new(NoopPublisher),
    };

    let use_case = CrawlUseCase::new(source, checkpoint, sink, owners, publisher);

    // 4. Stop fetching on Ctrl-C; already persisted work is kept
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing current record");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    // 5. Run
    let options = settings.crawl_options(chrono::Local::now().date_naive());
    let summary = use_case.execute(options, shutdown_rx).await?;

    println!("{summary}");
    if summary.state == RunState::Cancelled {
        warn!("Run was cancelled before completion");
    }
    Ok(())
}
