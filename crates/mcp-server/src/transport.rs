use crate::service::RouterService;
use anyhow::{Context, Result};
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::ServiceExt;

/// Speak MCP on stdin/stdout. Returns when the client disconnects.
/// Nothing but protocol bytes may touch stdout in this mode.
pub async fn serve_stdio(service: RouterService) -> Result<()> {
    let server = service
        .serve(stdio())
        .await
        .context("start MCP stdio server")?;
    server.waiting().await.context("MCP stdio server stopped")?;
    Ok(())
}

/// Speak MCP-over-HTTP at `http://{host}:{port}/mcp`. Runs until ctrl-c.
pub async fn serve_http(service: RouterService, host: &str, port: u16) -> Result<()> {
    let http_service = StreamableHttpService::new(
        move || Ok(service.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", http_service);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    log::info!("MCP HTTP server listening on http://{addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            log::info!("ctrl-c received, shutting down HTTP server");
        })
        .await
        .context("serve HTTP")?;
    Ok(())
}
