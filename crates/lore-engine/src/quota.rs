use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lore_core::ids::TeamId;
use lore_core::usage::{QuotaDimension, UsageSnapshot};
use lore_store::usage::ReserveOutcome;

use crate::error::EngineError;
use crate::subscription::SubscriptionService;

/// Warn once consumption crosses this share of the limit.
const WARN_PERCENT: u8 = 80;

/// Accounting verdict for one dimension of one snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub dimension: QuotaDimension,
    pub used: u64,
    pub limit: Option<u64>,
    pub percent: u8,
    pub unlimited: bool,
    pub warn: bool,
    pub exceeded: bool,
}

/// Pure, total accounting over a usage snapshot. Never fails for any
/// non-negative used/limit pair, including over-quota counters.
pub fn evaluate(snapshot: &UsageSnapshot, dimension: QuotaDimension, now: DateTime<Utc>) -> QuotaStatus {
    let (used, limit) = snapshot.dimension(dimension);

    // An elapsed trial forces the metered dimension over quota even
    // under the limit, so the only path forward is an upgrade.
    if dimension == QuotaDimension::Suggestions && snapshot.trial_expired(now) {
        return QuotaStatus {
            dimension,
            used,
            limit,
            percent: 100,
            unlimited: false,
            warn: true,
            exceeded: true,
        };
    }

    match limit {
        None => QuotaStatus {
            dimension,
            used,
            limit,
            percent: 0,
            unlimited: true,
            warn: false,
            exceeded: false,
        },
        Some(limit_value) => {
            // Denominator floor of 1 keeps a legitimate limit of 0 total.
            let denom = limit_value.max(1);
            let percent = ((100.0 * used as f64 / denom as f64).round() as u64).min(100) as u8;
            QuotaStatus {
                dimension,
                used,
                limit,
                percent,
                unlimited: false,
                warn: percent >= WARN_PERCENT,
                exceeded: percent >= 100,
            }
        }
    }
}

/// Per-dimension statuses for the usage view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageReport {
    pub suggestions: QuotaStatus,
    pub seats: QuotaStatus,
    pub sources: QuotaStatus,
}

/// Gates consuming transitions against the plan's allowances.
///
/// Only the suggestions dimension ever denies; seats and sources are
/// provisioning signals that drive warnings, never blocks.
pub struct QuotaAccountant {
    subscriptions: Arc<dyn SubscriptionService>,
}

impl QuotaAccountant {
    pub fn new(subscriptions: Arc<dyn SubscriptionService>) -> Self {
        Self { subscriptions }
    }

    /// Reserve one unit of `dimension` for `team`, or deny.
    ///
    /// The reservation is a single atomic increment-and-check performed
    /// by the subscription collaborator; there is no separate check
    /// call for a racing approval to slip through.
    #[instrument(skip(self), fields(team_id = %team, dimension = %dimension))]
    pub fn check_and_reserve(
        &self,
        team: &TeamId,
        dimension: QuotaDimension,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if dimension != QuotaDimension::Suggestions {
            return Ok(());
        }
        match self.subscriptions.reserve_suggestion(team, now)? {
            ReserveOutcome::Reserved => Ok(()),
            ReserveOutcome::Denied { used, limit } => {
                Err(EngineError::QuotaExceeded { used, limit })
            }
        }
    }

    /// Compensating action: hand a reserved unit back.
    pub fn release(&self, team: &TeamId) -> Result<(), EngineError> {
        self.subscriptions.release_suggestion(team)
    }

    /// Statuses across every dimension for display.
    pub fn report(&self, team: &TeamId, now: DateTime<Utc>) -> Result<UsageReport, EngineError> {
        let snapshot = self.subscriptions.usage(team)?;
        Ok(UsageReport {
            suggestions: evaluate(&snapshot, QuotaDimension::Suggestions, now),
            seats: evaluate(&snapshot, QuotaDimension::Seats, now),
            sources: evaluate(&snapshot, QuotaDimension::Sources, now),
        })
    }
}
