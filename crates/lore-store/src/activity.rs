use chrono::{DateTime, Utc};
use tracing::instrument;

use lore_core::activity::ActivityEntry;
use lore_core::ids::{ActivityId, SuggestionId};
use lore_core::suggestion::{SourceType, SuggestionStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

pub struct ActivityRepo {
    db: Database,
}

impl ActivityRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one lifecycle record to the trail. Rows are never updated
    /// or deleted.
    #[instrument(skip(self), fields(suggestion_id = %suggestion_id, resulting_status = %resulting_status))]
    pub fn append(
        &self,
        suggestion_id: &SuggestionId,
        resulting_status: SuggestionStatus,
        title: &str,
        source_type: SourceType,
        actor_name: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> Result<ActivityEntry, StoreError> {
        let id = ActivityId::new();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activity (id, suggestion_id, resulting_status, title, source_type,
                                       actor_name, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.as_str(),
                    suggestion_id.as_str(),
                    resulting_status.to_string(),
                    title,
                    source_type.to_string(),
                    actor_name,
                    occurred_at.to_rfc3339(),
                ],
            )?;

            Ok(ActivityEntry {
                id,
                suggestion_id: suggestion_id.clone(),
                resulting_status,
                title: title.to_string(),
                source_type,
                actor_name: actor_name.map(str::to_string),
                occurred_at,
            })
        })
    }

    /// Most recent entries first (the canonical display order).
    #[instrument(skip(self))]
    pub fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, suggestion_id, resulting_status, title, source_type, actor_name, occurred_at
                 FROM activity ORDER BY occurred_at DESC, id DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }

    /// All entries for one suggestion, oldest first.
    #[instrument(skip(self), fields(suggestion_id = %suggestion_id))]
    pub fn for_suggestion(
        &self,
        suggestion_id: &SuggestionId,
    ) -> Result<Vec<ActivityEntry>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, suggestion_id, resulting_status, title, source_type, actor_name, occurred_at
                 FROM activity WHERE suggestion_id = ?1 ORDER BY occurred_at ASC, id ASC",
            )?;
            let mut rows = stmt.query([suggestion_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM activity", [], |row| row.get(0))
                .map_err(Into::into)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<ActivityEntry, StoreError> {
    let resulting_status: String = row_helpers::get(row, 2, "activity", "resulting_status")?;
    let source_type: String = row_helpers::get(row, 4, "activity", "source_type")?;
    let occurred_at: String = row_helpers::get(row, 6, "activity", "occurred_at")?;

    Ok(ActivityEntry {
        id: ActivityId::from_raw(row_helpers::get::<String>(row, 0, "activity", "id")?),
        suggestion_id: SuggestionId::from_raw(row_helpers::get::<String>(
            row, 1, "activity", "suggestion_id",
        )?),
        resulting_status: row_helpers::parse_enum(&resulting_status, "activity", "resulting_status")?,
        title: row_helpers::get(row, 3, "activity", "title")?,
        source_type: row_helpers::parse_enum(&source_type, "activity", "source_type")?,
        actor_name: row_helpers::get_opt(row, 5, "activity", "actor_name")?,
        occurred_at: row_helpers::parse_timestamp(&occurred_at, "activity", "occurred_at")?,
    })
}
