use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use lore_core::detection::Detection;
use lore_core::ids::SuggestionId;
use lore_core::suggestion::{Suggestion, SuggestionStatus};
use lore_core::usage::QuotaDimension;
use lore_store::activity::ActivityRepo;
use lore_store::suggestions::SuggestionRepo;
use lore_store::Database;

use crate::error::EngineError;
use crate::publish::{CanonicalPublisher, PageDraft};
use crate::quota::QuotaAccountant;

/// Reviewer label when no actor name was supplied.
const DEFAULT_ACTOR: &str = "User";

/// Per-suggestion mutation lock. Approve/reject/promote on the same id
/// are serialized; suggestions are otherwise independent. The map is
/// bounded by the number of in-flight mutations: entries no longer held
/// by a caller are pruned on the next access.
struct SuggestionLocks {
    locks: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl SuggestionLocks {
    fn new() -> Self {
        Self { locks: HashMap::new() }
    }

    fn get(&mut self, suggestion_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.locks
            .entry(suggestion_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Owns suggestion state transitions and the activity trail.
///
/// Inbound detections become pending (or triaged) suggestions; a
/// reviewer's approve consults the quota accountant, publishes to the
/// canonical store, and appends one activity entry. Either every step
/// of a transition lands or none does.
pub struct LifecycleController {
    suggestions: SuggestionRepo,
    activity: ActivityRepo,
    accountant: QuotaAccountant,
    publisher: Arc<dyn CanonicalPublisher>,
    locks: parking_lot::Mutex<SuggestionLocks>,
}

impl LifecycleController {
    pub fn new(
        db: Database,
        accountant: QuotaAccountant,
        publisher: Arc<dyn CanonicalPublisher>,
    ) -> Self {
        Self {
            suggestions: SuggestionRepo::new(db.clone()),
            activity: ActivityRepo::new(db),
            accountant,
            publisher,
            locks: parking_lot::Mutex::new(SuggestionLocks::new()),
        }
    }

    /// Accept an upstream detection into the pipeline.
    ///
    /// Returns `None` when an open suggestion already covers the same
    /// source artifact and knowledge type. Validation failures reject
    /// the payload before any state mutation.
    #[instrument(skip(self, detection), fields(source_link = %detection.source_link))]
    pub fn ingest(&self, detection: &Detection) -> Result<Option<Suggestion>, EngineError> {
        detection.validate()?;

        if let Some(open) = self
            .suggestions
            .find_open_duplicate(&detection.source_link, detection.knowledge_type)?
        {
            info!(existing = %open.id, "duplicate detection suppressed");
            return Ok(None);
        }

        let initial = if detection.needs_triage {
            SuggestionStatus::Detected
        } else {
            SuggestionStatus::Pending
        };
        let suggestion = self.suggestions.insert(detection, initial)?;
        info!(suggestion_id = %suggestion.id, status = %initial, "suggestion created");
        Ok(Some(suggestion))
    }

    /// Move a triaged suggestion into the review queue.
    #[instrument(skip(self), fields(suggestion_id = %id))]
    pub async fn promote(&self, id: &SuggestionId) -> Result<Suggestion, EngineError> {
        let lock = self.locks.lock().get(id.as_str());
        let _guard = lock.lock().await;

        let current = self.suggestions.get(id)?;
        if !self.suggestions.promote(id)? {
            return Err(EngineError::InvalidTransition {
                from: current.status,
                to: SuggestionStatus::Pending,
            });
        }

        let updated = self.suggestions.get(id)?;
        self.activity.append(
            id,
            SuggestionStatus::Pending,
            &updated.title,
            updated.source_type,
            None,
            Utc::now(),
        )?;
        Ok(updated)
    }

    /// Decide a pending suggestion.
    ///
    /// Approval first takes an atomic quota reservation, then wins (or
    /// loses) the status compare-and-set, then publishes the rendered
    /// draft. A failed publish rolls both the status and the
    /// reservation back. Rejection never consumes quota.
    #[instrument(skip(self), fields(suggestion_id = %id, target = %target))]
    pub async fn transition(
        &self,
        id: &SuggestionId,
        target: SuggestionStatus,
        actor: Option<&str>,
    ) -> Result<Suggestion, EngineError> {
        let lock = self.locks.lock().get(id.as_str());
        let _guard = lock.lock().await;

        let current = self.suggestions.get(id)?;
        if !target.is_terminal() || !current.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition { from: current.status, to: target });
        }

        let now = Utc::now();
        let actor = actor.unwrap_or(DEFAULT_ACTOR);
        let approving = target == SuggestionStatus::Approved;

        if approving {
            self.accountant
                .check_and_reserve(&current.team_id, QuotaDimension::Suggestions, now)?;
        }

        if !self.suggestions.decide(id, target, now, actor)? {
            // Lost the race: the row is no longer pending. Hand the
            // reservation back before reporting.
            if approving {
                self.accountant.release(&current.team_id)?;
            }
            let from = self.suggestions.get(id)?.status;
            return Err(EngineError::InvalidTransition { from, to: target });
        }

        if approving {
            if let Err(err) = self.publish_approved(&current).await {
                warn!(suggestion_id = %id, error = %err, "publish failed, rolling back approval");
                self.suggestions.revert_decision(id)?;
                self.accountant.release(&current.team_id)?;
                return Err(err);
            }
        }

        let updated = self.suggestions.get(id)?;
        self.activity.append(
            id,
            target,
            &updated.title,
            updated.source_type,
            Some(actor),
            now,
        )?;
        info!(suggestion_id = %id, status = %target, "suggestion decided");
        Ok(updated)
    }

    async fn publish_approved(&self, suggestion: &Suggestion) -> Result<(), EngineError> {
        let draft = PageDraft {
            title: suggestion.title.clone(),
            blocks: lore_render::preview(&suggestion.proposed_content),
            target_page: suggestion.target_page.clone(),
        };
        let receipt = self
            .publisher
            .publish(&draft)
            .await
            .map_err(|e| EngineError::PublishFailed(e.to_string()))?;

        // Approval of a brand-new page binds it to the page the
        // canonical store created.
        if suggestion.target_page.is_none() {
            self.suggestions.set_target_page(&suggestion.id, &receipt.page)?;
        }
        Ok(())
    }

    pub fn suggestions(&self) -> &SuggestionRepo {
        &self.suggestions
    }

    pub fn activity(&self) -> &ActivityRepo {
        &self.activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lore_core::detection::DetectionError;
    use lore_core::ids::TeamId;
    use lore_core::suggestion::{KnowledgeType, SourceType};
    use lore_core::usage::PlanTier;
    use lore_store::usage::UsageRepo;
    use crate::publish::{AckPublisher, PublishReceipt, PublishRejected};
    use crate::subscription::StoreSubscriptions;

    struct FailingPublisher;

    #[async_trait]
    impl CanonicalPublisher for FailingPublisher {
        async fn publish(&self, _draft: &PageDraft) -> Result<PublishReceipt, PublishRejected> {
            Err(PublishRejected("canonical store unavailable".into()))
        }
    }

    fn team() -> TeamId {
        TeamId::from_raw("team_acme")
    }

    fn detection(link: &str) -> Detection {
        Detection {
            team_id: team(),
            source_type: SourceType::Chat,
            knowledge_type: KnowledgeType::Policy,
            title: "PTO policy update".into(),
            current_content: "Old".into(),
            proposed_content: "# PTO\n\nNew policy".into(),
            confidence: 0.95,
            source_link: link.into(),
            needs_triage: false,
        }
    }

    fn controller_with(
        plan: PlanTier,
        publisher: Arc<dyn CanonicalPublisher>,
    ) -> (LifecycleController, UsageRepo) {
        let db = Database::in_memory().unwrap();
        let usage = UsageRepo::new(db.clone());
        usage.get_or_create(&team(), plan).unwrap();
        let accountant =
            QuotaAccountant::new(Arc::new(StoreSubscriptions::new(UsageRepo::new(db.clone()))));
        (LifecycleController::new(db, accountant, publisher), usage)
    }

    fn controller(plan: PlanTier) -> (LifecycleController, UsageRepo) {
        controller_with(plan, Arc::new(AckPublisher))
    }

    #[test]
    fn idle_lock_entries_are_pruned() {
        let mut locks = SuggestionLocks::new();
        let a = locks.get("sugg_a");
        drop(a);

        let _b = locks.get("sugg_b");
        assert_eq!(locks.locks.len(), 1);
        assert!(locks.locks.contains_key("sugg_b"));
    }

    #[test]
    fn held_lock_entries_survive_pruning() {
        let mut locks = SuggestionLocks::new();
        let _a = locks.get("sugg_a");
        let _b = locks.get("sugg_b");
        assert_eq!(locks.locks.len(), 2);
    }

    #[test]
    fn ingest_creates_pending() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        assert_eq!(s.status, SuggestionStatus::Pending);
    }

    #[test]
    fn ingest_triage_creates_detected() {
        let (ctl, _) = controller(PlanTier::Starter);
        let mut d = detection("https://chat/1");
        d.needs_triage = true;
        let s = ctl.ingest(&d).unwrap().unwrap();
        assert_eq!(s.status, SuggestionStatus::Detected);
    }

    #[test]
    fn ingest_dedupes_open_suggestions() {
        let (ctl, _) = controller(PlanTier::Starter);
        ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        assert!(ctl.ingest(&detection("https://chat/1")).unwrap().is_none());

        // Same link, different knowledge type: not a duplicate
        let mut d = detection("https://chat/1");
        d.knowledge_type = KnowledgeType::Faq;
        assert!(ctl.ingest(&d).unwrap().is_some());
    }

    #[tokio::test]
    async fn ingest_allows_new_after_terminal() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        ctl.transition(&s.id, SuggestionStatus::Rejected, None).await.unwrap();
        assert!(ctl.ingest(&detection("https://chat/1")).unwrap().is_some());
    }

    #[test]
    fn ingest_rejects_malformed_before_mutation() {
        let (ctl, _) = controller(PlanTier::Starter);
        let mut d = detection("https://chat/1");
        d.title = String::new();
        let err = ctl.ingest(&d).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Malformed(DetectionError::MissingField("title"))
        ));
        assert!(ctl.suggestions().list(None, 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn promote_moves_detected_to_pending() {
        let (ctl, _) = controller(PlanTier::Starter);
        let mut d = detection("https://chat/1");
        d.needs_triage = true;
        let s = ctl.ingest(&d).unwrap().unwrap();

        let promoted = ctl.promote(&s.id).await.unwrap();
        assert_eq!(promoted.status, SuggestionStatus::Pending);
        assert_eq!(ctl.activity().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn promote_pending_fails() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let err = ctl.promote(&s.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition { from: SuggestionStatus::Pending, .. }
        ));
    }

    #[tokio::test]
    async fn approve_happy_path() {
        let (ctl, usage) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();

        let approved = ctl
            .transition(&s.id, SuggestionStatus::Approved, Some("dana"))
            .await
            .unwrap();
        assert_eq!(approved.status, SuggestionStatus::Approved);
        assert!(approved.decided_at.is_some());
        assert_eq!(approved.decided_by.as_deref(), Some("dana"));
        // New page got bound to the page the publisher created
        assert!(approved.target_page.is_some());

        assert_eq!(usage.snapshot(&team()).unwrap().suggestions_used, 1);

        let trail = ctl.activity().recent(10).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].resulting_status, SuggestionStatus::Approved);
        assert_eq!(trail[0].actor_name.as_deref(), Some("dana"));
    }

    #[tokio::test]
    async fn approve_defaults_actor_label() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let approved = ctl.transition(&s.id, SuggestionStatus::Approved, None).await.unwrap();
        assert_eq!(approved.decided_by.as_deref(), Some("User"));
    }

    #[tokio::test]
    async fn reject_never_consumes_quota() {
        let (ctl, usage) = controller(PlanTier::Trial);
        // Exhaust the allowance up front
        for _ in 0..10 {
            usage.try_reserve_suggestion(&team(), Utc::now()).unwrap();
        }

        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let rejected = ctl.transition(&s.id, SuggestionStatus::Rejected, None).await.unwrap();
        assert_eq!(rejected.status, SuggestionStatus::Rejected);
        assert_eq!(usage.snapshot(&team()).unwrap().suggestions_used, 10);
    }

    #[tokio::test]
    async fn approve_at_limit_fails_and_stays_pending() {
        let (ctl, usage) = controller(PlanTier::Trial);
        for _ in 0..10 {
            usage.try_reserve_suggestion(&team(), Utc::now()).unwrap();
        }

        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let err = ctl.transition(&s.id, SuggestionStatus::Approved, None).await.unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded { used: 10, limit: Some(10) }));

        let fetched = ctl.suggestions().get(&s.id).unwrap();
        assert_eq!(fetched.status, SuggestionStatus::Pending);
        assert!(fetched.decided_at.is_none());
        assert_eq!(ctl.activity().count().unwrap(), 0);
        assert_eq!(usage.snapshot(&team()).unwrap().suggestions_used, 10);
    }

    #[tokio::test]
    async fn terminal_suggestion_cannot_transition() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        ctl.transition(&s.id, SuggestionStatus::Approved, None).await.unwrap();

        let err = ctl.transition(&s.id, SuggestionStatus::Rejected, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition { from: SuggestionStatus::Approved, .. }
        ));
        assert_eq!(
            ctl.suggestions().get(&s.id).unwrap().status,
            SuggestionStatus::Approved
        );
    }

    #[tokio::test]
    async fn non_terminal_target_is_invalid() {
        let (ctl, _) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let err = ctl.transition(&s.id, SuggestionStatus::Detected, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_suggestion_is_not_found() {
        let (ctl, _) = controller(PlanTier::Starter);
        let err = ctl
            .transition(&SuggestionId::from_raw("sugg_ghost"), SuggestionStatus::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn publish_failure_rolls_everything_back() {
        let (ctl, usage) = controller_with(PlanTier::Starter, Arc::new(FailingPublisher));
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();

        let err = ctl.transition(&s.id, SuggestionStatus::Approved, None).await.unwrap_err();
        assert!(matches!(err, EngineError::PublishFailed(_)));

        let fetched = ctl.suggestions().get(&s.id).unwrap();
        assert_eq!(fetched.status, SuggestionStatus::Pending);
        assert!(fetched.decided_at.is_none());
        assert!(fetched.decided_by.is_none());
        assert_eq!(usage.snapshot(&team()).unwrap().suggestions_used, 0);
        assert_eq!(ctl.activity().count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_approvals_have_one_winner() {
        let (ctl, usage) = controller(PlanTier::Starter);
        let s = ctl.ingest(&detection("https://chat/1")).unwrap().unwrap();
        let ctl = Arc::new(ctl);

        let a = {
            let ctl = ctl.clone();
            let id = s.id.clone();
            tokio::spawn(async move {
                ctl.transition(&id, SuggestionStatus::Approved, Some("a")).await
            })
        };
        let b = {
            let ctl = ctl.clone();
            let id = s.id.clone();
            tokio::spawn(async move {
                ctl.transition(&id, SuggestionStatus::Approved, Some("b")).await
            })
        };

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        let wins = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);

        let loser = if ra.is_err() { ra } else { rb };
        assert!(matches!(
            loser.unwrap_err(),
            EngineError::InvalidTransition { from: SuggestionStatus::Approved, .. }
        ));

        // Exactly one unit consumed, never two
        assert_eq!(usage.snapshot(&team()).unwrap().suggestions_used, 1);
        assert_eq!(ctl.activity().count().unwrap(), 1);
    }
}
