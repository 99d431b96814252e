//! Control surface server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Control surface server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the control API binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:8811".parse().unwrap()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.bind_address.port() == 0 {
            return Err(self.validation_error("bind_address port must be nonzero"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_port_rejected() {
        let config = ServerConfig {
            bind_address: "0.0.0.0:0".parse().unwrap(),
        };
        assert!(config.validate().is_err());
    }
}
