use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::store::{JsonStore, StoreHandle, load_default_prices};

/// Entry pages of the department front-ends, printed in the startup banner.
pub const DEPARTMENT_PAGES: [(&str, &str); 5] = [
    ("Engineering", "/engineering.html"),
    ("Injection", "/injection.html"),
    ("Slush", "/slush.html"),
    ("Spray", "/spray.html"),
    ("Warehouse", "/warehouse.html"),
];

/// Configuration for the tracker server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_file: PathBuf,
    pub default_prices_file: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_file: PathBuf::from("data/data.json"),
            default_prices_file: PathBuf::from("data/default-material-prices.json"),
            dev_mode: false,
        }
    }
}

/// Build the full application router: API routes, request tracing and a
/// JSON 404 for everything else.
pub fn build_router(state: Arc<AppState>, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("No route for {}", uri.path())})),
    )
}

/// Best-effort LAN address: the local side of a UDP socket "connected" to a
/// public address. No packet is sent.
pub fn lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

fn print_banner(local_addr: SocketAddr, lan: Option<IpAddr>) {
    let port = local_addr.port();
    println!("Production order tracker running");
    println!("  Local:   http://localhost:{}", port);
    if let Some(ip) = lan {
        println!("  Network: http://{}:{}", ip, port);
    }
    println!();
    let base = match lan {
        Some(ip) => format!("http://{}:{}", ip, port),
        None => format!("http://localhost:{}", port),
    };
    for (name, path) in DEPARTMENT_PAGES {
        println!("  {:<12} {}{}", name, base, path);
    }
}

/// Start the tracker server and block until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.data_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let default_prices = load_default_prices(&config.default_prices_file);
    tracing::info!(
        data_file = %config.data_file.display(),
        default_prices = default_prices.len(),
        "Opening order store"
    );
    let store = StoreHandle::new(JsonStore::new(config.data_file.clone(), default_prices));
    let state = Arc::new(AppState { store });

    let app = build_router(state, config.dev_mode);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    print_banner(local_addr, lan_ip());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
