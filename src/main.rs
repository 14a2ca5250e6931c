use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use reqwest::Client;
use serde::Deserialize;
use std::{env, fs, net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use crate::backend::{Backend, SupabaseClient};
use crate::config::Settings;
use crate::search::SearchSessions;
use crate::session::SessionCache;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

mod auth_middleware;
mod backend;
mod booking;
mod config;
mod error;
mod filters;
mod models;
mod query;
mod registration;
mod routes;
mod search;
mod session;
mod wizard;

#[derive(Deserialize, Debug)]
struct ProxyConfig {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
}

// Applies proxyconfig.json, if present, as HTTP(S)_PROXY for the backend client
fn load_and_set_proxy_env_vars() -> Result<()> {
    let config_path = Path::new("proxyconfig.json");
    if !config_path.exists() {
        tracing::info!("proxyconfig.json not found, connecting to the backend directly.");
        return Ok(());
    }

    let config_content = fs::read_to_string(config_path).context("Failed to read proxyconfig.json")?;
    let proxy_config: ProxyConfig =
        serde_json::from_str(&config_content).context("Failed to parse proxyconfig.json")?;

    for (var, value) in [("HTTP_PROXY", proxy_config.http_proxy), ("HTTPS_PROXY", proxy_config.https_proxy)] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            // SAFETY: runs at the start of main before the client or any worker reads the environment
            unsafe { env::set_var(var, value) };
            tracing::info!("Set {} from proxyconfig.json", var);
        }
    }
    Ok(())
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionCache>,
    pub searches: Arc<SearchSessions>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, backend: Arc<dyn Backend>) -> Self {
        AppState {
            sessions: Arc::new(SessionCache::new(settings.session_ttl_secs)),
            searches: Arc::new(SearchSessions::new(backend.clone(), settings.search_session_ttl_secs)),
            settings,
            backend,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ev_marketplace=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    if let Err(e) = load_and_set_proxy_env_vars() {
        tracing::warn!("Failed to load or apply proxy configuration: {}", e);
    }

    tracing::info!("Starting EV marketplace server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    if settings.jwt_secret().is_some() {
        tracing::info!("Access tokens will be verified locally before identity lookups.");
    }

    // Built after the proxy variables are set so it picks them up
    let http_client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build backend HTTP client")?;
    let backend: Arc<dyn Backend> = Arc::new(SupabaseClient::new(http_client, &settings));

    let app_state = AppState::new(settings.clone(), backend);
    let app: Router = routes::create_router(app_state).nest_service("/static", ServeDir::new("static"));

    let addr: SocketAddr = settings.server_address.parse().with_context(|| {
        format!("Invalid server address format: {}", settings.server_address)
    })?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
