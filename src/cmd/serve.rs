//! HTTP server command: `production-orders serve`.

use anyhow::Result;

use production_orders::config::AppConfig;
use production_orders::tracker::server::{self, DEPARTMENT_PAGES};

pub async fn cmd_serve(
    mut config: AppConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
    open: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    // Spawn browser open before starting the server (which blocks)
    if open {
        let url = format!("http://localhost:{}{}", config.server.port, DEPARTMENT_PAGES[0].1);
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!(url = %url, error = %e, "Failed to open browser");
            }
        });
    }

    server::start_server(config.server_config(dev)).await
}
