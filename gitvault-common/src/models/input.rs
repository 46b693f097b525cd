// File: gitvault-common/src/models/input.rs

use std::collections::HashMap;

use url::Url;

use crate::error::Error;

/// Immutable snapshot of one credential request, parsed from the
/// `key=value` block Git writes to our standard input.
///
/// `protocol` and `host` are mandatory; their absence is a fatal parse
/// error. Everything else is optional and read-only after construction.
#[derive(Debug, Clone)]
pub struct InputArguments {
    protocol: String,
    host: String,
    path: Option<String>,
    username: Option<String>,
    password: Option<String>,
    extra: HashMap<String, String>,
}

impl InputArguments {
    pub fn from_map(mut map: HashMap<String, String>) -> Result<Self, Error> {
        let protocol = map
            .remove("protocol")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Configuration("required input 'protocol' is missing or empty".to_string())
            })?;

        let host = map.remove("host").filter(|v| !v.is_empty()).ok_or_else(|| {
            Error::Configuration("required input 'host' is missing or empty".to_string())
        })?;

        let path = map.remove("path").filter(|v| !v.is_empty());
        let username = map.remove("username").filter(|v| !v.is_empty());
        let password = map.remove("password").filter(|v| !v.is_empty());

        Ok(Self {
            protocol,
            host,
            path,
            username,
            password,
            extra: map,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The raw host input, possibly including a port (`example.com:8080`).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host name with any port suffix removed.
    pub fn host_name(&self) -> &str {
        match self.host.rsplit_once(':') {
            Some((name, port)) if port.parse::<u16>().is_ok() => name,
            _ => &self.host,
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.host
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(|v| v.as_str())
    }

    /// Full remote URL (no user-info component, no trailing slash games):
    /// `{protocol}://{host}[/{path}]`.
    pub fn remote_url(&self) -> Result<Url, Error> {
        let mut s = format!("{}://{}", self.protocol, self.host);
        if let Some(path) = &self.path {
            s.push('/');
            s.push_str(path.trim_start_matches('/'));
        }
        Ok(Url::parse(&s)?)
    }
}
