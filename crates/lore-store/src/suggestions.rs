use chrono::{DateTime, Utc};
use tracing::instrument;

use lore_core::detection::Detection;
use lore_core::ids::{PageId, SuggestionId};
use lore_core::suggestion::{KnowledgeType, Suggestion, SuggestionStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const COLUMNS: &str = "id, team_id, source_type, knowledge_type, title, current_content, \
                       proposed_content, confidence, status, source_link, target_page, \
                       created_at, decided_at, decided_by";

pub struct SuggestionRepo {
    db: Database,
}

impl SuggestionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a validated detection as a new suggestion.
    #[instrument(skip(self, detection), fields(team_id = %detection.team_id, source_type = %detection.source_type))]
    pub fn insert(
        &self,
        detection: &Detection,
        status: SuggestionStatus,
    ) -> Result<Suggestion, StoreError> {
        let id = SuggestionId::new();
        let now = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO suggestions (id, team_id, source_type, knowledge_type, title,
                                          current_content, proposed_content, confidence, status,
                                          source_link, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    id.as_str(),
                    detection.team_id.as_str(),
                    detection.source_type.to_string(),
                    detection.knowledge_type.to_string(),
                    detection.title,
                    detection.current_content,
                    detection.proposed_content,
                    detection.confidence,
                    status.to_string(),
                    detection.source_link,
                    now.to_rfc3339(),
                ],
            )?;

            Ok(Suggestion {
                id,
                team_id: detection.team_id.clone(),
                source_type: detection.source_type,
                knowledge_type: detection.knowledge_type,
                title: detection.title.clone(),
                current_content: detection.current_content.clone(),
                proposed_content: detection.proposed_content.clone(),
                confidence: detection.confidence,
                status,
                source_link: detection.source_link.clone(),
                target_page: None,
                created_at: now,
                decided_at: None,
                decided_by: None,
            })
        })
    }

    /// Get a suggestion by ID.
    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub fn get(&self, id: &SuggestionId) -> Result<Suggestion, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM suggestions WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_suggestion(row),
                None => Err(StoreError::NotFound(format!("suggestion {id}"))),
            }
        })
    }

    /// List suggestions, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub fn list(
        &self,
        status: Option<SuggestionStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Suggestion>, StoreError> {
        self.db.with_conn(|conn| {
            let (sql, params): (String, Vec<String>) = match status {
                Some(s) => (
                    format!(
                        "SELECT {COLUMNS} FROM suggestions WHERE status = ?1
                         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
                    ),
                    vec![s.to_string(), limit.to_string(), offset.to_string()],
                ),
                None => (
                    format!(
                        "SELECT {COLUMNS} FROM suggestions
                         ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                    ),
                    vec![limit.to_string(), offset.to_string()],
                ),
            };

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();
            let mut rows = stmt.query(params_refs.as_slice())?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_suggestion(row)?);
            }
            Ok(results)
        })
    }

    /// Find an open (non-terminal) suggestion for the same source
    /// artifact and knowledge type, if one exists.
    #[instrument(skip(self))]
    pub fn find_open_duplicate(
        &self,
        source_link: &str,
        knowledge_type: KnowledgeType,
    ) -> Result<Option<Suggestion>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM suggestions
                 WHERE source_link = ?1 AND knowledge_type = ?2
                   AND status IN ('detected', 'pending')
                 LIMIT 1"
            ))?;
            let mut rows = stmt.query(rusqlite::params![source_link, knowledge_type.to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_suggestion(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Promote a triaged suggestion into the review queue.
    /// Compare-and-set on status: false when the row was not `detected`.
    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub fn promote(&self, id: &SuggestionId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE suggestions SET status = 'pending' WHERE id = ?1 AND status = 'detected'",
                [id.as_str()],
            )?;
            Ok(changed == 1)
        })
    }

    /// Move a pending suggestion to a terminal status.
    /// Compare-and-set on status: exactly one caller wins a race; the
    /// loser gets false and must not treat the row as decided.
    #[instrument(skip(self), fields(suggestion_id = %id, status = %status))]
    pub fn decide(
        &self,
        id: &SuggestionId,
        status: SuggestionStatus,
        decided_at: DateTime<Utc>,
        decided_by: &str,
    ) -> Result<bool, StoreError> {
        debug_assert!(status.is_terminal());
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE suggestions SET status = ?1, decided_at = ?2, decided_by = ?3
                 WHERE id = ?4 AND status = 'pending'",
                rusqlite::params![
                    status.to_string(),
                    decided_at.to_rfc3339(),
                    decided_by,
                    id.as_str(),
                ],
            )?;
            Ok(changed == 1)
        })
    }

    /// Roll an approved suggestion back to pending after a failed
    /// canonical-store publish. Clears the decision fields.
    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub fn revert_decision(&self, id: &SuggestionId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE suggestions SET status = 'pending', decided_at = NULL, decided_by = NULL
                 WHERE id = ?1 AND status = 'approved'",
                [id.as_str()],
            )?;
            Ok(changed == 1)
        })
    }

    /// Re-target a suggestion at a different canonical page.
    /// Status is untouched.
    #[instrument(skip(self), fields(suggestion_id = %id, page_id = %page))]
    pub fn set_target_page(&self, id: &SuggestionId, page: &PageId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE suggestions SET target_page = ?1 WHERE id = ?2",
                rusqlite::params![page.as_str(), id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("suggestion {id}")));
            }
            Ok(())
        })
    }
}

fn row_to_suggestion(row: &rusqlite::Row<'_>) -> Result<Suggestion, StoreError> {
    let source_type: String = row_helpers::get(row, 2, "suggestions", "source_type")?;
    let knowledge_type: String = row_helpers::get(row, 3, "suggestions", "knowledge_type")?;
    let status: String = row_helpers::get(row, 8, "suggestions", "status")?;
    let created_at: String = row_helpers::get(row, 11, "suggestions", "created_at")?;
    let decided_at: Option<String> = row_helpers::get_opt(row, 12, "suggestions", "decided_at")?;

    Ok(Suggestion {
        id: SuggestionId::from_raw(row_helpers::get::<String>(row, 0, "suggestions", "id")?),
        team_id: lore_core::ids::TeamId::from_raw(row_helpers::get::<String>(
            row, 1, "suggestions", "team_id",
        )?),
        source_type: row_helpers::parse_enum(&source_type, "suggestions", "source_type")?,
        knowledge_type: row_helpers::parse_enum(&knowledge_type, "suggestions", "knowledge_type")?,
        title: row_helpers::get(row, 4, "suggestions", "title")?,
        current_content: row_helpers::get(row, 5, "suggestions", "current_content")?,
        proposed_content: row_helpers::get(row, 6, "suggestions", "proposed_content")?,
        confidence: row_helpers::get(row, 7, "suggestions", "confidence")?,
        status: row_helpers::parse_enum(&status, "suggestions", "status")?,
        source_link: row_helpers::get(row, 9, "suggestions", "source_link")?,
        target_page: row_helpers::get_opt::<String>(row, 10, "suggestions", "target_page")?
            .map(PageId::from_raw),
        created_at: row_helpers::parse_timestamp(&created_at, "suggestions", "created_at")?,
        decided_at: decided_at
            .map(|raw| row_helpers::parse_timestamp(&raw, "suggestions", "decided_at"))
            .transpose()?,
        decided_by: row_helpers::get_opt(row, 13, "suggestions", "decided_by")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::ids::TeamId;
    use lore_core::suggestion::SourceType;

    fn detection(link: &str) -> Detection {
        Detection {
            team_id: TeamId::from_raw("team_acme"),
            source_type: SourceType::Chat,
            knowledge_type: KnowledgeType::Policy,
            title: "PTO policy update".into(),
            current_content: "Old".into(),
            proposed_content: "New".into(),
            confidence: 0.9,
            source_link: link.into(),
            needs_triage: false,
        }
    }

    fn repo() -> SuggestionRepo {
        SuggestionRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn insert_and_get() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        assert!(s.id.as_str().starts_with("sugg_"));
        assert_eq!(s.status, SuggestionStatus::Pending);
        assert!(s.decided_at.is_none());

        let fetched = repo.get(&s.id).unwrap();
        assert_eq!(fetched.id, s.id);
        assert_eq!(fetched.title, "PTO policy update");
        assert_eq!(fetched.confidence, 0.9);
        assert!(fetched.target_page.is_none());
    }

    #[test]
    fn get_nonexistent_fails() {
        let repo = repo();
        let result = repo.get(&SuggestionId::from_raw("sugg_missing"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_with_status_filter() {
        let repo = repo();
        let a = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        repo.insert(&detection("https://chat/2"), SuggestionStatus::Detected)
            .unwrap();

        let pending = repo.list(Some(SuggestionStatus::Pending), 100, 0).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);

        let all = repo.list(None, 100, 0).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn list_pagination() {
        let repo = repo();
        for i in 0..5 {
            repo.insert(&detection(&format!("https://chat/{i}")), SuggestionStatus::Pending)
                .unwrap();
        }
        assert_eq!(repo.list(None, 2, 0).unwrap().len(), 2);
        assert_eq!(repo.list(None, 2, 4).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_lookup_matches_open_only() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();

        let dup = repo
            .find_open_duplicate("https://chat/1", KnowledgeType::Policy)
            .unwrap();
        assert_eq!(dup.unwrap().id, s.id);

        // Different knowledge type is not a duplicate
        assert!(repo
            .find_open_duplicate("https://chat/1", KnowledgeType::Faq)
            .unwrap()
            .is_none());

        // Terminal rows stop blocking
        repo.decide(&s.id, SuggestionStatus::Rejected, Utc::now(), "User")
            .unwrap();
        assert!(repo
            .find_open_duplicate("https://chat/1", KnowledgeType::Policy)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decide_sets_decision_fields() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        let when = Utc::now();
        assert!(repo.decide(&s.id, SuggestionStatus::Approved, when, "dana").unwrap());

        let fetched = repo.get(&s.id).unwrap();
        assert_eq!(fetched.status, SuggestionStatus::Approved);
        assert_eq!(fetched.decided_at.unwrap(), when);
        assert_eq!(fetched.decided_by.as_deref(), Some("dana"));
    }

    #[test]
    fn decide_is_single_winner() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        assert!(repo.decide(&s.id, SuggestionStatus::Approved, Utc::now(), "a").unwrap());
        // Second decision loses the compare-and-set
        assert!(!repo.decide(&s.id, SuggestionStatus::Rejected, Utc::now(), "b").unwrap());

        let fetched = repo.get(&s.id).unwrap();
        assert_eq!(fetched.status, SuggestionStatus::Approved);
        assert_eq!(fetched.decided_by.as_deref(), Some("a"));
    }

    #[test]
    fn decide_requires_pending() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Detected)
            .unwrap();
        assert!(!repo.decide(&s.id, SuggestionStatus::Approved, Utc::now(), "a").unwrap());
        assert_eq!(repo.get(&s.id).unwrap().status, SuggestionStatus::Detected);
    }

    #[test]
    fn promote_detected_only() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Detected)
            .unwrap();
        assert!(repo.promote(&s.id).unwrap());
        assert_eq!(repo.get(&s.id).unwrap().status, SuggestionStatus::Pending);

        // Already pending: promotion CAS fails
        assert!(!repo.promote(&s.id).unwrap());
    }

    #[test]
    fn revert_decision_clears_fields() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        repo.decide(&s.id, SuggestionStatus::Approved, Utc::now(), "a").unwrap();
        assert!(repo.revert_decision(&s.id).unwrap());

        let fetched = repo.get(&s.id).unwrap();
        assert_eq!(fetched.status, SuggestionStatus::Pending);
        assert!(fetched.decided_at.is_none());
        assert!(fetched.decided_by.is_none());

        // Rejected rows are not revertable
        repo.decide(&s.id, SuggestionStatus::Rejected, Utc::now(), "a").unwrap();
        assert!(!repo.revert_decision(&s.id).unwrap());
    }

    #[test]
    fn set_target_page() {
        let repo = repo();
        let s = repo
            .insert(&detection("https://chat/1"), SuggestionStatus::Pending)
            .unwrap();
        let page = PageId::from_raw("page_handbook");
        repo.set_target_page(&s.id, &page).unwrap();
        assert_eq!(repo.get(&s.id).unwrap().target_page, Some(page));
    }

    #[test]
    fn set_target_page_unknown_suggestion() {
        let repo = repo();
        let result = repo.set_target_page(
            &SuggestionId::from_raw("sugg_missing"),
            &PageId::from_raw("page_x"),
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
