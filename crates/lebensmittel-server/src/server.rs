//! `LebensmittelServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use lebensmittel_store::{MembershipQuery, Store};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::auth::CredentialValidator;
use crate::config::{RealtimeConfig, ServerConfig};
use crate::health::{self, HealthResponse};
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::dispatcher::{Dispatcher, DispatcherHandle};
use crate::websocket::session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record store.
    pub store: Store,
    /// Source of truth for group membership.
    pub membership: Arc<dyn MembershipQuery>,
    /// Bearer credential validation.
    pub auth: Arc<dyn CredentialValidator>,
    /// Realtime fan-out.
    pub dispatcher: DispatcherHandle,
    /// Connection tuning.
    pub realtime: Arc<RealtimeConfig>,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The backend server: owns the dispatcher and the HTTP listener.
pub struct LebensmittelServer {
    config: ServerConfig,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl LebensmittelServer {
    /// Create a server and start its dispatcher.
    ///
    /// Must be called inside a Tokio runtime. Membership is answered by
    /// `store` unless replaced with [`Self::with_membership`].
    pub fn new(config: ServerConfig, store: Store, auth: Arc<dyn CredentialValidator>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (dispatcher, task) = Dispatcher::start(&config.realtime, shutdown.token());
        shutdown.track("dispatcher", task);

        let state = AppState {
            membership: Arc::new(store.clone()),
            store,
            auth,
            dispatcher,
            realtime: Arc::new(config.realtime.clone()),
            metrics: None,
            start_time: Instant::now(),
        };
        Self {
            config,
            state,
            shutdown,
        }
    }

    /// Answer membership questions from `membership` instead of the store.
    #[must_use]
    pub fn with_membership(mut self, membership: Arc<dyn MembershipQuery>) -> Self {
        self.state.membership = membership;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::ORIGIN,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::AUTHORIZATION,
                HeaderName::from_static(api::extract::GROUP_HEADER),
            ]);

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(session::ws_handler))
            .nest("/api", api::routes())
            .with_state(self.state.clone())
            .layer(middleware::from_fn(count_requests))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address; the serving task is tracked by the
    /// shutdown coordinator.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
        });
        self.shutdown.track("http", task);

        info!(%local_addr, "server listening");
        Ok(local_addr)
    }

    /// Handle for emitting events from outside the HTTP layer.
    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.state.dispatcher
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state
        .dispatcher
        .snapshot_within(state.realtime.write_wait)
        .await;
    Json(health::health_check(
        state.start_time,
        snapshot.as_ref(),
        state.dispatcher.dropped_events(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn count_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
