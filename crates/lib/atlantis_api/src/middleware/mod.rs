//! Request middleware: the auth gate, permission gates and the legacy Basic gate.

pub mod auth;
pub mod legacy;
pub mod permissions;
