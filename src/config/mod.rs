use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use http::Uri;
use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(nested)]
    #[serde(default)]
    pub exporter: Exporter,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub endpoints: Vec<Endpoint>,

    #[validate(nested)]
    pub log: Option<Log>,
    pub prometheus: Option<Prometheus>,
    pub sentry: Option<Sentry>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).or_err(InternalError, "Unable to serialize conf")
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

/// Listener settings shared by every exported port.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Exporter {
    #[serde(default = "Exporter::default_bind")]
    pub bind: IpAddr,
    /// When present every port also gets a TLS listener on `port + 1`.
    #[validate(nested)]
    pub tls: Option<Tls>,
}

impl Exporter {
    fn default_bind() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            tls: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Tls {
    #[validate(length(min = 1))]
    pub cert_path: String,
    #[validate(length(min = 1))]
    pub key_path: String,
}

/// A built-in handler and the URL it is exported at.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Endpoint::validate_body"))]
pub struct Endpoint {
    #[validate(custom(function = "Endpoint::validate_url"))]
    pub url: String,
    #[serde(default)]
    pub kind: EndpointKind,
    pub body: Option<String>,
    #[serde(default = "Endpoint::default_status")]
    #[validate(range(min = 100, max = 599))]
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Endpoint {
    fn default_status() -> u16 {
        200
    }

    fn validate_url(url: &str) -> Result<(), ValidationError> {
        match Uri::from_str(url) {
            Ok(uri) if uri.path().starts_with('/') => Ok(()),
            Ok(_) => Err(ValidationError::new("url_path_required")),
            Err(_) => {
                let mut err = ValidationError::new("invalid_url");
                err.add_param("url".into(), &url.to_string());
                Err(err)
            }
        }
    }

    fn validate_body(&self) -> Result<(), ValidationError> {
        if self.kind == EndpointKind::Static && self.body.is_none() {
            Err(ValidationError::new("body_required_for_static"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    #[default]
    Static,
    Echo,
    Status,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(length(min = 1))]
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prometheus {
    pub address: SocketAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sentry {
    pub dsn: String,
}
