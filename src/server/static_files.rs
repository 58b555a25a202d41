//! Web UI asset serving

use std::path::Path;

use super::http::HttpResponse;

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Serve `path` (already normalized) from `root`
pub async fn serve(root: Option<&Path>, path: &str) -> HttpResponse {
    let Some(root) = root else {
        return HttpResponse::text("404 Not Found", "Not found");
    };

    let relative = path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };
    let file = root.join(relative);

    match tokio::fs::read(&file).await {
        Ok(body) => HttpResponse {
            status: "200 OK",
            content_type: content_type_for(&file),
            body,
        },
        Err(_) => HttpResponse::text("404 Not Found", "Not found"),
    }
}
