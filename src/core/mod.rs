pub mod config;
pub mod manager;

pub use config::{PolicyConfig, SessionConfig, SuppressionRules};
pub use manager::PolicyEngine;
