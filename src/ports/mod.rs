//! Port traits decoupling the domain from infrastructure.

pub mod config_port;
pub mod data_port;
