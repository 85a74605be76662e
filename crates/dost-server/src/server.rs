//! Shared handler state, router assembly and the serve loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use dost_learning::LearningService;
use dost_settings::DostSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::assistant::{Assistant, KeywordAssistant};
use crate::routes;
use crate::store::{MemoryStore, RecordStore};
use crate::transcription::{Transcriber, UnavailableTranscriber};
use crate::websocket::ConnectionManager;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// WebSocket registry and dispatcher.
    pub manager: Arc<ConnectionManager>,
    /// Pattern learning and insights.
    pub learning: Arc<LearningService>,
    /// Users, conversations, tasks, events.
    pub store: Arc<dyn RecordStore>,
    /// Chat replies and day summaries.
    pub assistant: Arc<dyn Assistant>,
    /// Speech-to-text.
    pub transcriber: Arc<dyn Transcriber>,
    /// Prometheus render handle; `/metrics` is empty without one.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// State backed by the in-process collaborators: memory store, keyword
    /// assistant, no transcription.
    pub fn in_process(settings: &DostSettings, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            manager: Arc::new(ConnectionManager::new(&settings.websocket)),
            learning: Arc::new(LearningService::new(&settings.learning)),
            store: Arc::new(MemoryStore::new()),
            assistant: Arc::new(KeywordAssistant),
            transcriber: Arc::new(UnavailableTranscriber),
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// The connection manager is shut down as soon as the signal fires so open
/// sockets close and graceful shutdown does not wait on them.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let manager = Arc::clone(&state.manager);
    manager.start();
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "server listening");
    }

    let signal = async move {
        shutdown.await;
        info!("shutdown signal received");
        manager.shutdown().await;
    };
    axum::serve(listener, router(state))
        .with_graceful_shutdown(signal)
        .await?;

    info!("server stopped");
    Ok(())
}
