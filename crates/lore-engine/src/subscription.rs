use chrono::{DateTime, Utc};

use lore_core::ids::TeamId;
use lore_core::usage::UsageSnapshot;
use lore_store::usage::{ReserveOutcome, UsageRepo};

use crate::error::EngineError;

/// Seam to the subscription collaborator that owns the usage counters.
///
/// The engine never writes counters directly; it asks for a single
/// atomic reserve-or-deny, and hands units back only as the publish
/// rollback compensation.
pub trait SubscriptionService: Send + Sync {
    fn usage(&self, team: &TeamId) -> Result<UsageSnapshot, EngineError>;

    /// Increment-and-check as one step. Implementations must not expose
    /// a window between the check and the increment.
    fn reserve_suggestion(
        &self,
        team: &TeamId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, EngineError>;

    fn release_suggestion(&self, team: &TeamId) -> Result<(), EngineError>;
}

/// SQLite-backed subscription collaborator.
pub struct StoreSubscriptions {
    usage: UsageRepo,
}

impl StoreSubscriptions {
    pub fn new(usage: UsageRepo) -> Self {
        Self { usage }
    }
}

impl SubscriptionService for StoreSubscriptions {
    fn usage(&self, team: &TeamId) -> Result<UsageSnapshot, EngineError> {
        Ok(self.usage.snapshot(team)?)
    }

    fn reserve_suggestion(
        &self,
        team: &TeamId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, EngineError> {
        Ok(self.usage.try_reserve_suggestion(team, now)?)
    }

    fn release_suggestion(&self, team: &TeamId) -> Result<(), EngineError> {
        Ok(self.usage.release_suggestion(team)?)
    }
}
