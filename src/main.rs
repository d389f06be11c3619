use std::sync::Arc;
use tracing::{error, info};

use nexus_explorer::api::{self, ApiState};
use nexus_explorer::config::ExplorerConfig;
use nexus_explorer::mirror::{InMemoryMirror, MirrorQuery, MirrorStore};
use nexus_explorer::node::{ChainSource, NodeRpcClient};
use nexus_explorer::sync::{
	CheckpointConfig, CheckpointEventHandler, ExplorerInitializer, ExplorerSync,
	LoggingEventHandler, StatePersistenceService, SyncConfig,
};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = match ExplorerConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			std::process::exit(1);
		}
	};

	info!("Starting explorer against {}", config.node_url);

	let client = match NodeRpcClient::new(config.node_url.clone(), config.request_timeout()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create node client: {}", e);
			std::process::exit(1);
		}
	};
	let source: Arc<dyn ChainSource> = Arc::new(client);
	let store: Arc<dyn MirrorStore> = Arc::new(InMemoryMirror::new());
	let persistence = Arc::new(StatePersistenceService::new(config.data_dir.clone()));

	let initializer = ExplorerInitializer::new(source.clone(), store.clone())
		.with_persistence(persistence.clone());
	match initializer.initialize().await {
		Ok(report) => info!(
			"Initialized mirror: {} chains, {} tokens, {} apps, restored checkpoint: {:?}",
			report.chains_discovered, report.tokens, report.apps, report.restored_blocks
		),
		Err(e) => {
			error!("Failed to initialize explorer: {}", e);
			std::process::exit(1);
		}
	}

	let mut sync = ExplorerSync::new(
		source,
		store.clone(),
		SyncConfig {
			interval: config.sync_interval(),
			window: config.parallel_window,
			seed_chunk_size: config.seed_chunk_size,
		},
	);
	sync.register_handler(Box::new(LoggingEventHandler));
	sync.register_handler(Box::new(CheckpointEventHandler::new(
		persistence,
		store.clone(),
		CheckpointConfig {
			interval: config.checkpoint_interval,
			keep_count: config.checkpoint_keep,
		},
	)));
	tokio::spawn(sync.run());

	let query = MirrorQuery::new(store)
		.with_page_size(config.page_size)
		.with_native_token(config.native_token.clone());
	api::serve(ApiState::new(query), config.listen_addr).await;
}
