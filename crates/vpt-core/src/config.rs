//! Environment-derived configuration, validated eagerly so a missing
//! mandatory variable fails fast at process startup rather than surfacing
//! as a confusing runtime error deep in a request handler.

use crate::error::{Error, Result};

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::Config(format!("missing required env var {name}")))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Shared config for the host binary.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub host_name: String,
    pub bind_port: u16,
    pub server_url: Option<String>,
    pub scripts_dir: String,
}

impl HostConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host_name: env_var("HOST_NAME")?,
            bind_port: env_var_or("HOST_PORT", "6109")
                .parse()
                .map_err(|_| Error::Config("HOST_PORT must be a valid port number".into()))?,
            server_url: std::env::var("SERVER_URL").ok(),
            scripts_dir: env_var_or("SCRIPTS_DIR", "./scripts"),
        })
    }
}

/// Shared config for the server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_port: u16,
    pub bind_loopback_only: bool,
    pub scripts_dir: String,
    /// Address at which this server is reachable from hosts, handed to a
    /// host as the callback target for async script execution. Absent in
    /// setups where hosts never call back (e.g. synchronous-only use).
    pub server_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let port = env_var_or("SERVER_PORT", "6110")
            .parse()
            .map_err(|_| Error::Config("SERVER_PORT must be a valid port number".into()))?;
        Ok(Self {
            server_port: port,
            bind_loopback_only: env_var_or("SERVER_BIND_LOOPBACK", "false") == "true",
            scripts_dir: env_var_or("SCRIPTS_DIR", "./scripts"),
            server_url: std::env::var("SERVER_URL").ok(),
        })
    }

    pub fn bind_addr(&self) -> std::net::SocketAddr {
        let host = if self.bind_loopback_only {
            [127, 0, 0, 1]
        } else {
            [0, 0, 0, 0]
        };
        std::net::SocketAddr::from((host, self.server_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_without_env() {
        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("SERVER_BIND_LOOPBACK");
        let cfg = ServerConfig::from_env().unwrap();
        assert_eq!(cfg.server_port, 6110);
        assert!(!cfg.bind_loopback_only);
    }

    #[test]
    fn host_config_requires_host_name() {
        std::env::remove_var("HOST_NAME");
        assert!(HostConfig::from_env().is_err());
    }
}
