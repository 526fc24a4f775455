use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lightwave_oidc::{
    AuthSessionStore, AuthzCodeStore, OidcState, RequestProcessor, oidc_router, start_reaper,
};
use tower::ServiceBuilder;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::StsConfig;
use crate::directory::{DirectoryError, StaticDirectory};

pub struct StsServer {
    addr: SocketAddr,
    app: Router,
    codes: Arc<AuthzCodeStore>,
    sessions: Arc<AuthSessionStore>,
    reaper_interval: Duration,
}

/// Assembles the router around a processor.
pub fn build_app(cfg: &StsConfig, processor: RequestProcessor) -> Router {
    oidc_router(OidcState::new(processor, cfg.oidc.secure_cookies))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            // Path only: query strings carry hints and state.
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(GlobalConcurrencyLimitLayer::new(
                    cfg.server.max_concurrent_requests,
                )),
        )
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub struct ServerBuilder {
    config: StsConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: StsConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: StsConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Loads the directory and wires the stores, processor and router.
    ///
    /// # Errors
    ///
    /// A tenant's signing key cannot be loaded.
    pub fn build(self) -> Result<StsServer, DirectoryError> {
        let cfg = self.config;
        let directory = Arc::new(StaticDirectory::from_config(&cfg)?);
        let codes = Arc::new(AuthzCodeStore::new(cfg.oidc.authorization_code_lifetime));
        let sessions = Arc::new(AuthSessionStore::new(
            cfg.oidc.cookie_prefix.clone(),
            cfg.oidc.session_lifetime,
        ));
        let processor = RequestProcessor::new(
            directory.clone(),
            directory,
            codes.clone(),
            sessions.clone(),
        );

        Ok(StsServer {
            addr: cfg.addr(),
            app: build_app(&cfg, processor),
            codes,
            sessions,
            reaper_interval: cfg.oidc.reaper_interval,
        })
    }
}

impl StsServer {
    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub fn codes(&self) -> &Arc<AuthzCodeStore> {
        &self.codes
    }

    pub fn sessions(&self) -> &Arc<AuthSessionStore> {
        &self.sessions
    }

    /// Serves until Ctrl+C or SIGTERM. The store reaper runs for the
    /// lifetime of the listener.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let reaper = start_reaper(
            self.codes.clone(),
            self.sessions.clone(),
            self.reaper_interval,
        );
        tracing::info!(addr = %self.addr, "listening");

        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        reaper.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
