//! Entry point pairing a configuration with client construction.

use crate::client::Client;
use crate::config::Config;
use crate::error::Result;

/// Permission types accepted by `auth/role/grant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    ReadWrite,
}

impl Permission {
    /// Numeric `permType` sent to the gateway.
    pub const fn code(self) -> i64 {
        match self {
            Permission::Read => 0,
            Permission::Write => 1,
            Permission::ReadWrite => 2,
        }
    }
}

/// Holds a configuration and mints clients from it.
///
/// Holds no per-request state; every client it creates starts without a
/// token and shares nothing mutable with its siblings.
#[derive(Debug, Clone)]
pub struct Etcd {
    config: Config,
}

impl Etcd {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Load the configuration from file and environment, see [`Config::load`].
    pub fn from_env(path: Option<&str>) -> Result<Self> {
        Ok(Self::new(Config::load(path)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh client for this configuration.
    pub fn client(&self) -> Result<Client> {
        Client::new(self.config.clone())
    }
}
