//! Infrastructure adapters implementing the port traits.

pub mod cached_data_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
