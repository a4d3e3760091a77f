use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use lore_core::activity::ActivityEntry;

/// Chronological buckets over the activity trail. Every entry lands in
/// exactly one bucket; caller-supplied order is preserved within each.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityBuckets {
    pub today: Vec<ActivityEntry>,
    pub yesterday: Vec<ActivityEntry>,
    pub last7_days: Vec<ActivityEntry>,
    pub older: Vec<ActivityEntry>,
}

impl ActivityBuckets {
    pub fn len(&self) -> usize {
        self.today.len() + self.yesterday.len() + self.last7_days.len() + self.older.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition entries by half-open day boundaries anchored at midnight
/// of `now`: today = [midnight, ∞), yesterday = [midnight−1d, midnight),
/// last 7 days = [midnight−7d, midnight−1d), older = the rest.
/// Classification only; entries are never reordered or mutated.
pub fn bucket(entries: Vec<ActivityEntry>, now: DateTime<Utc>) -> ActivityBuckets {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let yesterday_start = midnight - Duration::days(1);
    let week_start = midnight - Duration::days(7);

    let mut buckets = ActivityBuckets::default();
    for entry in entries {
        let t = entry.occurred_at;
        if t >= midnight {
            buckets.today.push(entry);
        } else if t >= yesterday_start {
            buckets.yesterday.push(entry);
        } else if t >= week_start {
            buckets.last7_days.push(entry);
        } else {
            buckets.older.push(entry);
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::ids::{ActivityId, SuggestionId};
    use lore_core::suggestion::{SourceType, SuggestionStatus};

    fn entry(occurred_at: DateTime<Utc>) -> ActivityEntry {
        ActivityEntry {
            id: ActivityId::new(),
            suggestion_id: SuggestionId::from_raw("sugg_1"),
            resulting_status: SuggestionStatus::Approved,
            title: "t".into(),
            source_type: SourceType::Chat,
            actor_name: None,
            occurred_at,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        "2026-08-28T15:30:00Z".parse().unwrap()
    }

    #[test]
    fn entries_land_in_expected_buckets() {
        let now = fixed_now();
        let buckets = bucket(
            vec![
                entry("2026-08-28T09:00:00Z".parse().unwrap()), // today
                entry("2026-08-27T23:59:59Z".parse().unwrap()), // yesterday
                entry("2026-08-27T00:00:00Z".parse().unwrap()), // yesterday boundary
                entry("2026-08-26T23:59:59Z".parse().unwrap()), // last 7 days
                entry("2026-08-21T00:00:00Z".parse().unwrap()), // last 7 days boundary
                entry("2026-08-20T23:59:59Z".parse().unwrap()), // older
                entry("2025-01-01T00:00:00Z".parse().unwrap()), // older
            ],
            now,
        );
        assert_eq!(buckets.today.len(), 1);
        assert_eq!(buckets.yesterday.len(), 2);
        assert_eq!(buckets.last7_days.len(), 2);
        assert_eq!(buckets.older.len(), 2);
    }

    #[test]
    fn midnight_itself_is_today() {
        let now = fixed_now();
        let buckets = bucket(vec![entry("2026-08-28T00:00:00Z".parse().unwrap())], now);
        assert_eq!(buckets.today.len(), 1);
    }

    #[test]
    fn strict_partition_counts_sum() {
        let now = fixed_now();
        let entries: Vec<ActivityEntry> = (0..50)
            .map(|i| entry(now - Duration::hours(i * 7)))
            .collect();
        let total = entries.len();
        let buckets = bucket(entries, now);
        assert_eq!(buckets.len(), total);
    }

    #[test]
    fn caller_order_preserved_within_bucket() {
        let now = fixed_now();
        let newest = entry("2026-08-28T12:00:00Z".parse().unwrap());
        let oldest = entry("2026-08-28T01:00:00Z".parse().unwrap());
        // Descending display order in, descending out
        let buckets = bucket(vec![newest.clone(), oldest.clone()], now);
        assert_eq!(buckets.today[0].id, newest.id);
        assert_eq!(buckets.today[1].id, oldest.id);
    }

    #[test]
    fn future_entries_count_as_today() {
        let now = fixed_now();
        let buckets = bucket(vec![entry(now + Duration::minutes(5))], now);
        assert_eq!(buckets.today.len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_buckets() {
        assert!(bucket(vec![], fixed_now()).is_empty());
    }
}
