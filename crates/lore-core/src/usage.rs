use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier a team is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Trial,
    Starter,
    Business,
    Enterprise,
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trial => write!(f, "trial"),
            Self::Starter => write!(f, "starter"),
            Self::Business => write!(f, "business"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "starter" => Ok(Self::Starter),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown plan tier: {other}")),
        }
    }
}

/// Default allowances a tier is provisioned with. `None` means no cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanLimits {
    pub suggestions: Option<u64>,
    pub seats: Option<u64>,
    pub sources: Option<u64>,
}

impl PlanTier {
    pub fn default_limits(self) -> PlanLimits {
        match self {
            Self::Trial => PlanLimits {
                suggestions: Some(10),
                seats: Some(3),
                sources: Some(1),
            },
            Self::Starter => PlanLimits {
                suggestions: Some(20),
                seats: Some(5),
                sources: Some(3),
            },
            Self::Business => PlanLimits {
                suggestions: Some(200),
                seats: Some(25),
                sources: Some(10),
            },
            Self::Enterprise => PlanLimits {
                suggestions: None,
                seats: None,
                sources: None,
            },
        }
    }
}

/// An independently metered resource under a subscription plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDimension {
    Suggestions,
    Seats,
    Sources,
}

impl std::fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suggestions => write!(f, "suggestions"),
            Self::Seats => write!(f, "seats"),
            Self::Sources => write!(f, "sources"),
        }
    }
}

/// Point-in-time view of a team's plan counters.
///
/// Owned by the subscription collaborator; the accountant only reads it.
/// A `None` limit is the unlimited sentinel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub plan: PlanTier,
    pub suggestions_used: u64,
    pub suggestions_limit: Option<u64>,
    pub seats_used: u64,
    pub seats_limit: Option<u64>,
    pub sources_connected: u64,
    pub sources_limit: Option<u64>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl UsageSnapshot {
    /// (used, limit) for one dimension.
    pub fn dimension(&self, dim: QuotaDimension) -> (u64, Option<u64>) {
        match dim {
            QuotaDimension::Suggestions => (self.suggestions_used, self.suggestions_limit),
            QuotaDimension::Seats => (self.seats_used, self.seats_limit),
            QuotaDimension::Sources => (self.sources_connected, self.sources_limit),
        }
    }

    /// Whether the trial window has elapsed as of `now`.
    pub fn trial_expired(&self, now: DateTime<Utc>) -> bool {
        self.trial_ends_at.is_some_and(|ends| ends < now)
    }
}
