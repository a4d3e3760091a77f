use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::instrument;

use lore_core::ids::TeamId;
use lore_core::usage::{PlanTier, UsageSnapshot};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const TRIAL_DAYS: i64 = 14;

/// Result of an atomic suggestion-quota reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Denied { used: u64, limit: Option<u64> },
}

/// Per-team plan counters. The reserve operation is the only way the
/// suggestion counter goes up; it is a single conditional UPDATE, so
/// two racing approvals cannot both pass a full quota.
pub struct UsageRepo {
    db: Database,
}

impl UsageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a team's usage row, provisioning it with the plan's
    /// default limits on first sight. Trial plans get a trial window.
    #[instrument(skip(self), fields(team_id = %team, plan = %plan))]
    pub fn get_or_create(&self, team: &TeamId, plan: PlanTier) -> Result<UsageSnapshot, StoreError> {
        self.db.with_conn(|conn| {
            if let Some(snapshot) = read_snapshot(conn, team)? {
                return Ok(snapshot);
            }

            let limits = plan.default_limits();
            let now = Utc::now();
            let trial_ends_at = match plan {
                PlanTier::Trial => Some(now + Duration::days(TRIAL_DAYS)),
                _ => None,
            };

            conn.execute(
                "INSERT INTO team_usage (team_id, plan, suggestions_limit, seats_limit,
                                         sources_limit, trial_ends_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    team.as_str(),
                    plan.to_string(),
                    limits.suggestions.map(|v| v as i64),
                    limits.seats.map(|v| v as i64),
                    limits.sources.map(|v| v as i64),
                    trial_ends_at.map(|t| t.to_rfc3339()),
                    now.to_rfc3339(),
                ],
            )?;

            Ok(UsageSnapshot {
                plan,
                suggestions_used: 0,
                suggestions_limit: limits.suggestions,
                seats_used: 0,
                seats_limit: limits.seats,
                sources_connected: 0,
                sources_limit: limits.sources,
                trial_ends_at,
            })
        })
    }

    /// Current counters for a team.
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn snapshot(&self, team: &TeamId) -> Result<UsageSnapshot, StoreError> {
        self.db.with_conn(|conn| {
            read_snapshot(conn, team)?
                .ok_or_else(|| StoreError::NotFound(format!("team usage {team}")))
        })
    }

    /// Atomically reserve one unit of the suggestions allowance.
    ///
    /// Increment-and-check as one step: the conditional UPDATE only
    /// fires while used is below the effective limit (or the limit is
    /// the unlimited sentinel), and the whole read-evaluate-update runs
    /// under the connection lock. The effective limit floors at 1,
    /// matching the percent computation's denominator floor, so a
    /// legitimate limit of 0 admits one unit before denying. An expired
    /// trial denies regardless of counters.
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn try_reserve_suggestion(
        &self,
        team: &TeamId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, StoreError> {
        self.db.with_conn(|conn| {
            let snapshot = read_snapshot(conn, team)?
                .ok_or_else(|| StoreError::NotFound(format!("team usage {team}")))?;

            if snapshot.trial_expired(now) {
                return Ok(ReserveOutcome::Denied {
                    used: snapshot.suggestions_used,
                    limit: snapshot.suggestions_limit,
                });
            }

            let changed = conn.execute(
                "UPDATE team_usage
                 SET suggestions_used = suggestions_used + 1, updated_at = ?1
                 WHERE team_id = ?2
                   AND (suggestions_limit IS NULL OR suggestions_used < MAX(suggestions_limit, 1))",
                rusqlite::params![now.to_rfc3339(), team.as_str()],
            )?;

            if changed == 1 {
                Ok(ReserveOutcome::Reserved)
            } else {
                Ok(ReserveOutcome::Denied {
                    used: snapshot.suggestions_used,
                    limit: snapshot.suggestions_limit,
                })
            }
        })
    }

    /// Compensating action for a failed publish: hand the reserved unit
    /// back. Floors at zero.
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn release_suggestion(&self, team: &TeamId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE team_usage
                 SET suggestions_used = MAX(suggestions_used - 1, 0), updated_at = ?1
                 WHERE team_id = ?2",
                rusqlite::params![Utc::now().to_rfc3339(), team.as_str()],
            )?;
            Ok(())
        })
    }

    /// Provisioning signal: a seat was filled. Advisory only, never
    /// blocks approvals.
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn add_seat(&self, team: &TeamId) -> Result<(), StoreError> {
        self.bump(team, "seats_used")
    }

    /// Provisioning signal: a source integration was connected.
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn connect_source(&self, team: &TeamId) -> Result<(), StoreError> {
        self.bump(team, "sources_connected")
    }

    /// Adjust the trial window (plan assignment arrives from billing).
    #[instrument(skip(self), fields(team_id = %team))]
    pub fn set_trial_ends_at(
        &self,
        team: &TeamId,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE team_usage SET trial_ends_at = ?1, updated_at = ?2 WHERE team_id = ?3",
                rusqlite::params![
                    ends_at.map(|t| t.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                    team.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    fn bump(&self, team: &TeamId, column: &'static str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE team_usage SET {column} = {column} + 1, updated_at = ?1
                     WHERE team_id = ?2"
                ),
                rusqlite::params![Utc::now().to_rfc3339(), team.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("team usage {team}")));
            }
            Ok(())
        })
    }
}

fn read_snapshot(conn: &Connection, team: &TeamId) -> Result<Option<UsageSnapshot>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT plan, suggestions_used, suggestions_limit, seats_used, seats_limit,
                sources_connected, sources_limit, trial_ends_at
         FROM team_usage WHERE team_id = ?1",
    )?;
    let mut rows = stmt.query([team.as_str()])?;
    match rows.next()? {
        Some(row) => {
            let plan: String = row_helpers::get(row, 0, "team_usage", "plan")?;
            let trial_ends_at: Option<String> =
                row_helpers::get_opt(row, 7, "team_usage", "trial_ends_at")?;
            Ok(Some(UsageSnapshot {
                plan: row_helpers::parse_enum(&plan, "team_usage", "plan")?,
                suggestions_used: row_helpers::get::<i64>(row, 1, "team_usage", "suggestions_used")?
                    as u64,
                suggestions_limit: row_helpers::get_opt::<i64>(
                    row, 2, "team_usage", "suggestions_limit",
                )?
                .map(|v| v as u64),
                seats_used: row_helpers::get::<i64>(row, 3, "team_usage", "seats_used")? as u64,
                seats_limit: row_helpers::get_opt::<i64>(row, 4, "team_usage", "seats_limit")?
                    .map(|v| v as u64),
                sources_connected: row_helpers::get::<i64>(
                    row, 5, "team_usage", "sources_connected",
                )? as u64,
                sources_limit: row_helpers::get_opt::<i64>(row, 6, "team_usage", "sources_limit")?
                    .map(|v| v as u64),
                trial_ends_at: trial_ends_at
                    .map(|raw| row_helpers::parse_timestamp(&raw, "team_usage", "trial_ends_at"))
                    .transpose()?,
            }))
        }
        None => Ok(None),
    }
}
