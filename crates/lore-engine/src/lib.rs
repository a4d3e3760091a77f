//! Suggestion lifecycle orchestration.
//!
//! - [`lifecycle::LifecycleController`]: ingest, promote, approve/reject
//! - [`quota::QuotaAccountant`]: plan-limit accounting and reservation
//! - [`resolver::PageResolver`]: debounced page search and re-targeting
//! - [`projector`]: time-bucketed activity views
//! - [`publish`] / [`subscription`]: collaborator seams

pub mod error;
pub mod lifecycle;
pub mod projector;
pub mod publish;
pub mod quota;
pub mod resolver;
pub mod subscription;

pub use error::EngineError;
pub use lifecycle::LifecycleController;
pub use quota::QuotaAccountant;
pub use resolver::PageResolver;
