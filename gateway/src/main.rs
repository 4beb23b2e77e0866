mod api;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::Method as HttpMethod,
    response::Response,
    routing::{get, on, MethodFilter},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Internal imports
use crate::api::{render, ApiError};
use rally_core::registry::Method;
use rally_core::{build, GatewayConfig, Payload, Registry, RouteDefinition, Runtime};

// Shared, read-only after startup
#[derive(Clone)]
struct AppState {
    config: Arc<GatewayConfig>,
    runtime: Arc<Runtime>,
}

impl AppState {
    fn new(config: GatewayConfig) -> Self {
        let runtime = Arc::new(Runtime::from_config(&config));
        Self {
            config: Arc::new(config),
            runtime,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Rally Gateway Initializing...");

    let config = GatewayConfig::from_env().context("Invalid gateway configuration")?;
    let addr = config.bind_addr();
    let state = AppState::new(config);

    info!("Registered {} tool routes.", Registry::routes().len());
    let app = app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gateway listening on {}...", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped.");
    Ok(())
}

/// One axum route per table entry, plus the health check.
fn app(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));

    for route in Registry::routes() {
        router = router.route(
            route.path,
            on(
                method_filter(route),
                move |State(state): State<AppState>, method: HttpMethod, body: Bytes| {
                    dispatch(state, route, method, body)
                },
            ),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn method_filter(route: &RouteDefinition) -> MethodFilter {
    route
        .methods
        .iter()
        .map(|method| match method {
            Method::Get => MethodFilter::GET,
            Method::Post => MethodFilter::POST,
        })
        .reduce(MethodFilter::or)
        .unwrap_or(MethodFilter::GET)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => {
            error!("Cannot listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Rally Gateway: Operational"
}

// validate -> build argv -> run -> render
async fn dispatch(
    state: AppState,
    route: &'static RouteDefinition,
    method: HttpMethod,
    body: Bytes,
) -> Result<Response, ApiError> {
    // axum answers HEAD on every GET route
    if method == HttpMethod::HEAD {
        return Err(ApiError::HeadNotAllowed);
    }

    // Fixed routes never look at the body
    let payload = if route.required.is_empty() {
        Payload::new()
    } else {
        Payload::from_json_slice(&body).map_err(ApiError::MalformedBody)?
    };

    let argv = build(route, &state.config.tool, &payload)?;
    info!("{:?} -> {}", route.id, argv);

    let result = state.runtime.execute(&argv).await?;
    if !result.success() {
        warn!(
            "{:?} exited with {}: {}",
            route.id,
            result.exit_code,
            result.stderr_lossy().trim_end()
        );
    }

    Ok(render(route.response, result))
}
