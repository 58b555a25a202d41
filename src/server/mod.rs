//! HTTP server
//!
//! Accepts connections on a tokio listener and hands each one its own task.
//! Requests are independent; the only shared state is what [`AppState`] holds.

pub mod http;
mod router;
mod static_files;

pub use router::route;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::settings::Settings;
use crate::state::AppState;

/// How long a client gets to send its request
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Bind the listener described by `settings`
pub async fn bind(settings: &Settings) -> std::io::Result<TcpListener> {
    TcpListener::bind(settings.listen_addr()).await
}

/// Serve requests until the listener fails
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state).await {
                tracing::debug!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: &AppState) -> std::io::Result<()> {
    let request = match tokio::time::timeout(READ_TIMEOUT, http::read_request(&mut stream)).await {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            let response = http::HttpResponse::text("408 Request Timeout", "Request timeout");
            return http::write_response(&mut stream, &response).await;
        }
    };

    let response = route(state, &request).await;
    tracing::debug!(
        "{} {} -> {}",
        request.method,
        request.path(),
        response.code()
    );

    http::write_response(&mut stream, &response).await
}
