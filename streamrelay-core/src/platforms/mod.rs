// File: src/platforms/mod.rs

pub use streamrelay_common::models::ConnectionState;

// Re-export submodules
pub mod streamlabs;
