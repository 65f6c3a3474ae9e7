use async_trait::async_trait;
use http::{Response, StatusCode};
use log::{debug, warn};
use matchit::{InsertError, Router as MatchRouter};
use pingora::{apps::http_app::ServeHttp, protocols::http::ServerSession};

use crate::core::metrics::DISPATCHED_REQUESTS;

use super::source::{Handler, ServletSource};

/// Routes requests on one listener to the handlers mounted there.
///
/// Mapping paths follow servlet conventions: `/` is the default handler for
/// anything unmatched, `/prefix/*` matches the prefix and everything below it,
/// and any other path matches exactly. The first handler mapped to a path wins.
pub struct PathDispatch {
    port: u16,
    routes: MatchRouter<Handler>,
    fallback: Option<Handler>,
    mounted: usize,
}

impl PathDispatch {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            routes: MatchRouter::new(),
            fallback: None,
            mounted: 0,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of handlers successfully mounted.
    pub fn mounted(&self) -> usize {
        self.mounted
    }

    /// Mount a source's handler at its URL path.
    ///
    /// Returns `false` when the path is already taken.
    pub fn mount(&mut self, source: &ServletSource) -> bool {
        let path = source.path();
        let handler = source.handler().clone();

        let result = if path == "/" {
            if self.fallback.is_some() {
                Err(format!("default handler already mounted on port {}", self.port))
            } else {
                self.fallback = Some(handler);
                Ok(())
            }
        } else if let Some(prefix) = path.strip_suffix("/*") {
            self.insert_prefix(prefix, handler)
                .map_err(|e| e.to_string())
        } else {
            self.routes
                .insert(escape(path), handler)
                .map_err(|e| e.to_string())
        };

        match result {
            Ok(()) => {
                debug!("Mounted {path} on port {}", self.port);
                self.mounted += 1;
                true
            }
            Err(e) => {
                warn!("Skipping handler for {path} on port {}: {e}", self.port);
                false
            }
        }
    }

    // Both routes go in together or not at all.
    fn insert_prefix(&mut self, prefix: &str, handler: Handler) -> Result<(), InsertError> {
        let prefix = escape(prefix);
        let base = if prefix.is_empty() { "/".to_string() } else { prefix.clone() };
        let mut routes = self.routes.clone();
        routes.insert(base, handler.clone())?;
        routes.insert(format!("{prefix}/{{*rest}}"), handler)?;
        self.routes = routes;
        Ok(())
    }

    /// Handler responsible for `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&Handler> {
        match self.routes.at(path) {
            Ok(matched) => Some(matched.value),
            Err(_) => self.fallback.as_ref(),
        }
    }
}

// matchit treats braces as parameter syntax.
fn escape(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

#[async_trait]
impl ServeHttp for PathDispatch {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let path = http_session.req_header().uri.path().to_string();
        let port = self.port.to_string();

        match self.resolve(&path) {
            Some(handler) => {
                DISPATCHED_REQUESTS.with_label_values(&[&port, "true"]).inc();
                handler.response(http_session).await
            }
            None => {
                DISPATCHED_REQUESTS.with_label_values(&[&port, "false"]).inc();
                not_found_response()
            }
        }
    }
}

pub(crate) fn not_found_response() -> Response<Vec<u8>> {
    let mut response = Response::new(b"Not Found".to_vec());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
