use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_tracker_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_tracker::config::AppConfig;
use job_tracker::error::AppError;
use job_tracker::telemetry;
use job_tracker::workflows::applications::{
    ApplicationRepository, InMemoryApplicationStore, SqliteApplicationStore, TrackerService,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database_path = Some(database);
    }

    telemetry::init(&config.telemetry)?;

    match config.storage.database_path.clone() {
        Some(path) => {
            let store = SqliteApplicationStore::open(&path)?;
            info!(database = %path.display(), "using sqlite application store");
            serve(config, store).await
        }
        None => {
            warn!("no database configured; applications are kept in memory only");
            serve(config, InMemoryApplicationStore::new()).await
        }
    }
}

async fn serve<R>(config: AppConfig, repository: R) -> Result<(), AppError>
where
    R: ApplicationRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let tracker_service = Arc::new(TrackerService::new(Arc::new(repository)));

    let app = with_tracker_routes(tracker_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "job application tracker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
