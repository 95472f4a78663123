//! Database pool initialization and schema

pub mod init;

pub use init::*;
