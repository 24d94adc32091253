//! Ghost host: canned-response stand-ins for real backend calls.
//!
//! A [`GhostService`] is built once from a [`GhostConfig`]. Each call to
//! [`GhostService::serve`] picks a recorded fixture for a route, rewrites the
//! configured fields and holds the response for the configured latency.

pub mod config;
pub mod delay;
pub mod document;
pub mod error;
pub mod fixtures;
pub mod resource;
pub mod rewrite;
pub mod service;

pub use config::GhostConfig;
pub use delay::{DelayConfig, DelayOutcome, DelaySimulator};
pub use document::{Document, PayloadFormat};
pub use error::{GhostError, GhostResult, ResourceError};
pub use fixtures::{FixtureRecord, FixtureRepository, FixtureSelector, RouteKey};
pub use resource::{ResourceRef, ResourceResolver};
pub use rewrite::{FieldKind, FieldNames, FieldRewriter, OverrideRule, OverrideRules};
pub use service::{GhostService, ServedFixture};
