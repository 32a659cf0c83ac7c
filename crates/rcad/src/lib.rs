//! rcad library - resilient root-cause diagnosis orchestration.
//!
//! Exposes modules for the binary and for integration tests.

pub mod aggregator;
pub mod archive;
pub mod audit;
pub mod orchestrator;
pub mod providers;
pub mod report;
pub mod resilience;
pub mod service;
pub mod sources;

pub use aggregator::{ActionRule, ActionRules, Aggregator};
pub use orchestrator::{Collaborators, Evidence, Orchestrator};
pub use resilience::{CircuitBreaker, RateLimiter, ResilientCaller};
pub use service::{DiagnosisOutcome, DiagnosisService};
