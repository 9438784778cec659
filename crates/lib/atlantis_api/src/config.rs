//! API server configuration.

use atlantis_core::config::AuthConfig;

/// Which gate protects the application routes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateMode {
    /// Sessions, providers, roles and permission gates.
    #[default]
    Full,
    /// Single shared Basic credential; no roles or permissions.
    LegacyBasic,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:4141").
    pub bind_addr: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    pub gate: GateMode,
}
