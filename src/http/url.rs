use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("could not parse URL: {0}")]
    Malformed(String),

    #[error("unsupported scheme: {0} (only http and https are probed)")]
    UnsupportedScheme(String),

    #[error("URL is missing a host")]
    MissingHost,
}

/// A parsed scan target, reduced to exactly the fields the probe templates
/// and raw client need: scheme, host, port, and the literal path+query to
/// splice into the request line verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetUrl {
    pub https: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
    canonical: String,
}

impl TargetUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let parsed = url::Url::parse(raw.trim()).map_err(|e| UrlError::Malformed(e.to_string()))?;

        let https = match parsed.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        };

        let host = parsed.host_str().ok_or(UrlError::MissingHost)?.to_string();
        let port = parsed.port().unwrap_or(if https { 443 } else { 80 });

        let mut path = parsed.path().to_string();
        if path.is_empty() {
            path = "/".to_string();
        }
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let canonical = format!(
            "{}://{}:{}{}",
            if https { "https" } else { "http" },
            host,
            port,
            path
        );

        Ok(TargetUrl {
            https,
            host,
            port,
            path,
            canonical,
        })
    }

    /// The stable string used as the key into the baseline map and in the
    /// findings/error logs — always includes the resolved port.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Value for the `Host` header: bare hostname, with `:port` appended only
    /// when the port is non-default for the scheme.
    pub fn host_header(&self) -> String {
        let default_port = if self.https { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}
