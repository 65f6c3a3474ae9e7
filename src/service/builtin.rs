use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::BytesMut;
use http::{Response, StatusCode};
use log::{debug, error};
use pingora::{apps::http_app::ServeHttp, protocols::http::ServerSession};

use crate::{
    config::{Endpoint, EndpointKind},
    core::ExportResult,
    exporter::{Handler, ServletSource},
};

use super::status::StatusHttpApp;

/// Largest request body the echo handler reflects back.
const MAX_ECHO_BODY: usize = 64 * 1024;

/// Fixed response configured in YAML.
pub struct StaticHttpApp {
    status: StatusCode,
    body: Vec<u8>,
    headers: HashMap<String, String>,
}

impl StaticHttpApp {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>, headers: HashMap<String, String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers,
        }
    }
}

#[async_trait]
impl ServeHttp for StaticHttpApp {
    async fn response(&self, _http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let mut builder = Response::builder().status(self.status);
        for (k, v) in self.headers.iter() {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder.body(self.body.clone()).unwrap_or_else(|e| {
            error!("Failed to build static response: {e}");
            internal_error_response()
        })
    }
}

/// Reflects method, path and body of the request.
pub struct EchoHttpApp {
    headers: HashMap<String, String>,
}

impl EchoHttpApp {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    fn render(method: &str, path: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!("{method} {path}\n").into_bytes();
        out.extend_from_slice(body);
        out
    }
}

#[async_trait]
impl ServeHttp for EchoHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let (method, path) = {
            let req_header = http_session.req_header();
            (req_header.method.to_string(), req_header.uri.path().to_string())
        };

        let mut body = BytesMut::new();
        loop {
            match http_session.read_request_body().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > MAX_ECHO_BODY {
                        debug!("Echo body for {path} exceeds {MAX_ECHO_BODY} bytes");
                        return Response::builder()
                            .status(StatusCode::PAYLOAD_TOO_LARGE)
                            .body(Vec::new())
                            .unwrap_or_else(|_| internal_error_response());
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Failed to read echo body for {path}: {e}");
                    return Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(e.to_string().into_bytes())
                        .unwrap_or_else(|_| internal_error_response());
                }
            }
        }

        let mut builder = Response::builder().status(StatusCode::OK);
        for (k, v) in self.headers.iter() {
            builder = builder.header(k.as_str(), v.as_str());
        }
        builder
            .body(Self::render(&method, &path, &body))
            .unwrap_or_else(|e| {
                error!("Failed to build echo response: {e}");
                internal_error_response()
            })
    }
}

fn internal_error_response() -> Response<Vec<u8>> {
    let mut response = Response::new(b"Internal Server Error".to_vec());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Build the handler configured for an endpoint.
pub fn build_handler(endpoint: &Endpoint) -> ExportResult<Handler> {
    let handler: Handler = match endpoint.kind {
        EndpointKind::Static => {
            let status = StatusCode::from_u16(endpoint.status)
                .map_err(|e| crate::config_error!("endpoint {}: {e}", endpoint.url))?;
            Arc::new(StaticHttpApp::new(
                status,
                endpoint.body.clone().unwrap_or_default(),
                endpoint.headers.clone(),
            ))
        }
        EndpointKind::Echo => Arc::new(EchoHttpApp::new(endpoint.headers.clone())),
        EndpointKind::Status => Arc::new(StatusHttpApp),
    };
    Ok(handler)
}

/// Turn configured endpoints into servlet sources, in configuration order.
pub fn build_sources(endpoints: &[Endpoint]) -> ExportResult<Vec<ServletSource>> {
    endpoints
        .iter()
        .map(|endpoint| ServletSource::parse(&endpoint.url, build_handler(endpoint)?))
        .collect()
}
