//! # atlantis_core
//!
//! Authentication and authorization core for Atlantis: permission model,
//! identity providers, sessions and configuration.

pub mod auth;
pub mod config;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
