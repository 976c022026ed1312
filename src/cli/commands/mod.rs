//! CLI command implementations.

pub mod csv_cmd;
pub mod export;
pub mod sections;
