pub mod audit;
pub mod engine;
pub mod router;
pub mod rules;
pub mod text;
pub mod validator;

pub use crate::domain::model::{MatchTier, RoutingDecision, Validation};
pub use crate::domain::ports::{AuditPipeline, ConfigProvider, Storage};
pub use crate::utils::error::Result;
pub use engine::AuditEngine;
pub use router::Router;
pub use validator::RoutingValidator;
