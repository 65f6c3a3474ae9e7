use async_trait::async_trait;
use http::{Response, StatusCode};
use pingora::{apps::http_app::ServeHttp, protocols::http::ServerSession};
use serde::Serialize;

use crate::core::status;

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Readiness handler, exportable at any URL like other endpoints.
///
/// Returns 200 `{"status":"ok"}` while the lifecycle is started and 503
/// otherwise, so load balancers drain the node once shutdown begins.
pub struct StatusHttpApp;

impl StatusHttpApp {
    fn current() -> (StatusCode, StatusResponse) {
        if status::is_ready() {
            (
                StatusCode::OK,
                StatusResponse {
                    status: "ok",
                    error: None,
                },
            )
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                StatusResponse {
                    status: "error",
                    error: Some("Lifecycle not started"),
                },
            )
        }
    }
}

#[async_trait]
impl ServeHttp for StatusHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);
        let (code, body) = Self::current();
        json_response(code, &body)
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Vec<u8>> {
    let json_body = serde_json::to_vec(body).unwrap_or_else(|e| {
        log::error!("Failed to serialize status response: {e}");
        b"{}".to_vec()
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(json_body)
        .unwrap_or_else(|e| {
            log::error!("Failed to build status HTTP response: {e}");
            let mut response = Response::new(b"Internal Server Error".to_vec());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}
