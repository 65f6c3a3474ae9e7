use std::{fmt, str::FromStr, sync::Arc};

use http::Uri;
use pingora::apps::http_app::ServeHttp;

use crate::{config_error, core::ExportResult};

/// Request handler mounted on an exported listener.
pub type Handler = Arc<dyn ServeHttp + Send + Sync>;

/// A handler and the URL it should be served at.
///
/// Only the URL's explicit port and its path are used. A URL without an
/// explicit port (even `https://host/x`) leaves the port unspecified.
#[derive(Clone)]
pub struct ServletSource {
    url: Uri,
    handler: Handler,
}

impl ServletSource {
    pub fn new(url: Uri, handler: Handler) -> Self {
        Self { url, handler }
    }

    pub fn parse(url: &str, handler: Handler) -> ExportResult<Self> {
        let url = Uri::from_str(url).map_err(|e| config_error!("invalid url {url}: {e}"))?;
        Ok(Self::new(url, handler))
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Explicit port, `None` when the URL leaves it unspecified.
    pub fn port(&self) -> Option<u16> {
        self.url.port_u16()
    }

    /// Mount path, `/` when the URL has none.
    pub fn path(&self) -> &str {
        match self.url.path() {
            "" => "/",
            path => path,
        }
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for ServletSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServletSource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::Response;
    use pingora::protocols::http::ServerSession;

    /// Handler that answers every request with its own label.
    pub(crate) struct Labelled(pub &'static str);

    #[async_trait]
    impl ServeHttp for Labelled {
        async fn response(&self, _http_session: &mut ServerSession) -> Response<Vec<u8>> {
            Response::new(self.0.as_bytes().to_vec())
        }
    }

    pub(crate) fn source(url: &str) -> ServletSource {
        ServletSource::parse(url, Arc::new(Labelled("test"))).unwrap()
    }

    #[test]
    fn test_explicit_port() {
        let source = source("http://localhost:8080/api/users");
        assert_eq!(source.port(), Some(8080));
        assert_eq!(source.path(), "/api/users");
    }

    #[test]
    fn test_scheme_does_not_imply_port() {
        assert_eq!(source("http://localhost/status").port(), None);
        assert_eq!(source("https://localhost/status").port(), None);
    }

    #[test]
    fn test_missing_path_mounts_at_root() {
        assert_eq!(source("http://localhost:9090").path(), "/");
    }

    #[test]
    fn test_invalid_url() {
        let err = ServletSource::parse("http://local host/", Arc::new(Labelled("x"))).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Configuration error: invalid url http://local host/: "));
        assert!(!message.contains("{e}"));
        assert!(message.len() > "Configuration error: invalid url http://local host/: ".len());
    }
}
