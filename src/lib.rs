pub mod app;
#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, toml_config::TomlConfig, CliConfig};

pub use app::pipelines::RoutingAuditPipeline;
pub use core::{AuditEngine, Router, RoutingValidator};
pub use domain::model::{MatchTier, Region, RoutingDecision, Validation};
pub use utils::error::{Result, RouterError};
