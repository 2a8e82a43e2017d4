use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use mme::{ApiRegistry, TermValidator};
use mme_core::{
    constants::DEFAULT_REST_ADDR, load_core_config, ConfigSources, InMemoryAuditStore,
    InMemoryPatientStore, IncomingRequestProcessor, RemoteServerRegistry,
};

/// Main entry point for the matchmaker node
///
/// Serves the `/match` endpoint for partner servers over REST.
///
/// # Environment Variables
/// - `MME_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MME_PATIENTS_FILE`: JSON array of local patients (default: none)
/// - `MME_REMOTES_FILE`: YAML list of partner servers
/// - `MME_SUPPORT_NAME`, `MME_SUPPORT_INSTITUTION`, `MME_SUPPORT_EMAIL`: default contact
/// - `MME_REPLY_TOP_GENES`, `MME_QUERY_TOP_GENES`, `MME_HTTP_TIMEOUT_SECS`
///
/// # Errors
/// Returns an error if configuration cannot be loaded, the address cannot be bound, or the
/// server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("mme=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MME_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let config = load_core_config(ConfigSources::from_lookup(|key| std::env::var(key).ok()))?;
    let patients = match std::env::var("MME_PATIENTS_FILE") {
        Ok(path) => InMemoryPatientStore::from_json_file(Path::new(&path))?,
        Err(_) => {
            tracing::warn!("MME_PATIENTS_FILE not set; no local patients will match");
            InMemoryPatientStore::default()
        }
    };
    let patients = Arc::new(patients);

    let registry = Arc::new(ApiRegistry::with_supported_versions(
        TermValidator::standard()?,
        config.default_contact().clone(),
    ));
    let servers = Arc::new(RemoteServerRegistry::new(config.remote_servers().to_vec()));
    tracing::info!(
        "supporting API versions {:?} for {} partner server(s)",
        registry.supported_versions(),
        servers.servers().len()
    );

    let processor = IncomingRequestProcessor::new(
        registry,
        Arc::new(config),
        servers,
        patients.clone(),
        patients,
        Arc::new(InMemoryAuditStore::new()),
    );
    let app = api_rest::router(AppState {
        processor: Arc::new(processor),
    });

    tracing::info!("-- Starting matchmaker node on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
