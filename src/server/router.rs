//! Request routing

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::http::{HttpRequest, HttpResponse};
use super::static_files;
use crate::commands::{runners, version};
use crate::state::AppState;
use crate::Error;

/// Dispatch a request to its command and render the result
pub async fn route(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let method = request.method.as_str();
    if method == "OPTIONS" {
        return HttpResponse::empty("200 OK");
    }

    let path = request.path();
    match path.as_str() {
        "/api/runners/register" | "/register" => {
            if method != "POST" {
                return method_not_allowed();
            }
            match parse_body::<runners::RegisterRequest>(&request.body) {
                Ok(req) => respond(runners::register_runner(state, req).await),
                Err(response) => response,
            }
        }
        "/api/runners" | "/runners" => {
            if method != "GET" {
                return method_not_allowed();
            }
            respond(runners::list_runners(state).await)
        }
        "/api/runners/delete" | "/delete" => {
            if method != "POST" {
                return method_not_allowed();
            }
            match parse_body::<runners::DeleteRequest>(&request.body) {
                Ok(req) => respond(runners::delete_runner(state, req).await),
                Err(response) => response,
            }
        }
        "/api/runners/restart" | "/restart" => {
            if method != "POST" {
                return method_not_allowed();
            }
            match parse_body::<runners::RestartRequest>(&request.body) {
                Ok(req) => respond(runners::restart_runner(state, req).await),
                Err(response) => response,
            }
        }
        "/api/runners/logs" | "/logs" => {
            if method != "GET" {
                return method_not_allowed();
            }
            respond(runners::runner_logs(state, request.query_param("name")).await)
        }
        "/api/version" | "/version" => {
            if method != "GET" {
                return method_not_allowed();
            }
            HttpResponse::json("200 OK", &version::get_version())
        }
        _ if method == "GET" => {
            static_files::serve(state.settings.static_dir.as_deref(), &path).await
        }
        _ => HttpResponse::text("404 Not Found", "Not found"),
    }
}

fn method_not_allowed() -> HttpResponse {
    HttpResponse::text("405 Method Not Allowed", "Method not allowed")
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejecting request body: {}", e);
        error_response("400 Bad Request", "Invalid request body", None)
    })
}

fn respond<T: Serialize>(result: crate::Result<T>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::json("200 OK", &value),
        Err(e) => render_error(&e),
    }
}

fn render_error(error: &Error) -> HttpResponse {
    error_response(error.status(), &error.to_string(), error.tool_output())
}

fn error_response(status: &'static str, message: &str, output: Option<&str>) -> HttpResponse {
    let mut body = json!({
        "success": false,
        "message": message,
    });
    if let Some(output) = output {
        body["output"] = json!(output);
    }
    HttpResponse::json(status, &body)
}
