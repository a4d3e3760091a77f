use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use lore_core::detection::Detection;
use lore_core::ids::{PageId, SuggestionId, TeamId};
use lore_core::page::PageCandidate;
use lore_core::suggestion::SuggestionStatus;
use lore_core::usage::{PlanTier, QuotaDimension};
use lore_engine::publish::AckPublisher;
use lore_engine::resolver::{PageIndex, SearchOutcome};
use lore_engine::subscription::StoreSubscriptions;
use lore_engine::{projector, LifecycleController, PageResolver, QuotaAccountant};
use lore_store::suggestions::SuggestionRepo;
use lore_store::usage::UsageRepo;
use lore_store::Database;
use lore_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "lore", about = "Knowledge suggestion pipeline", version)]
struct Cli {
    /// Data directory (defaults to ~/.lore)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Feed a detection payload (JSON file) into the pipeline
    Ingest {
        #[arg(long)]
        file: PathBuf,
        /// Plan tier used when the team has no usage row yet
        #[arg(long, default_value = "trial")]
        plan: PlanTier,
    },
    /// List suggestions, newest first
    List {
        #[arg(long)]
        status: Option<SuggestionStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Move a triaged suggestion into the review queue
    Promote { id: SuggestionId },
    /// Approve a pending suggestion and publish it
    Approve {
        id: SuggestionId,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Reject a pending suggestion
    Reject {
        id: SuggestionId,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Search the page index for rebind candidates
    Search { query: String },
    /// Point a suggestion at a different canonical page
    Rebind { id: SuggestionId, page: PageId },
    /// Render a suggestion's proposed content as structured blocks
    Preview { id: SuggestionId },
    /// Show current vs proposed content for a suggestion
    Diff {
        id: SuggestionId,
        /// Interleaved removed/added lines instead of two panes
        #[arg(long)]
        unified: bool,
    },
    /// Recent activity, bucketed by day
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Plan usage report for a team
    Usage {
        #[arg(long)]
        team: TeamId,
        #[arg(long, default_value = "trial")]
        plan: PlanTier,
    },
}

/// Page index backed by a `pages.json` file in the data directory.
/// Stands in for the workspace-tool connector; matching is a plain
/// case-insensitive substring scan over title and excerpt.
struct JsonPageIndex {
    pages: Vec<PageCandidate>,
}

impl JsonPageIndex {
    fn load(data_dir: &std::path::Path) -> Self {
        let path = data_dir.join("pages.json");
        let pages = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self { pages }
    }
}

#[async_trait::async_trait]
impl PageIndex for JsonPageIndex {
    async fn search(
        &self,
        query: &str,
    ) -> Result<Vec<PageCandidate>, lore_engine::EngineError> {
        let needle = query.to_lowercase();
        Ok(self
            .pages
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.excerpt.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        json: cli.json_logs,
        ..TelemetryConfig::default()
    });

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => home_dir().join(".lore"),
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    let db = Database::open(&data_dir.join("lore.db")).context("opening database")?;
    tracing::debug!(path = %data_dir.display(), "database ready");

    let usage = UsageRepo::new(db.clone());
    let accountant =
        QuotaAccountant::new(Arc::new(StoreSubscriptions::new(UsageRepo::new(db.clone()))));
    let controller = LifecycleController::new(db.clone(), accountant, Arc::new(AckPublisher));

    match cli.command {
        Command::Ingest { file, plan } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let detection: Detection =
                serde_json::from_str(&raw).context("parsing detection payload")?;
            usage.get_or_create(&detection.team_id, plan)?;
            match controller.ingest(&detection)? {
                Some(s) => println!("{} {} {}", s.id, s.status, s.title),
                None => println!("duplicate: an open suggestion already covers this source"),
            }
        }
        Command::List { status, limit } => {
            for s in controller.suggestions().list(status, limit, 0)? {
                println!(
                    "{} {:<9} {:>4.2} {} {}",
                    s.id, s.status, s.confidence, s.knowledge_type, s.title
                );
            }
        }
        Command::Promote { id } => {
            let s = controller.promote(&id).await?;
            println!("{} {}", s.id, s.status);
        }
        Command::Approve { id, actor } => {
            let s = controller
                .transition(&id, SuggestionStatus::Approved, actor.as_deref())
                .await?;
            let page = s.target_page.as_ref().map(|p| p.as_str()).unwrap_or("-");
            println!("{} approved, page {}", s.id, page);
        }
        Command::Reject { id, actor } => {
            let s = controller
                .transition(&id, SuggestionStatus::Rejected, actor.as_deref())
                .await?;
            println!("{} rejected", s.id);
        }
        Command::Search { query } => {
            let resolver = PageResolver::new(
                Arc::new(JsonPageIndex::load(&data_dir)),
                SuggestionRepo::new(db.clone()),
            );
            match resolver.search(&query).await? {
                SearchOutcome::EmptyQuery => println!("empty query"),
                SearchOutcome::NoMatches => println!("no matches"),
                SearchOutcome::Superseded => {}
                SearchOutcome::Matches(pages) => {
                    for p in pages {
                        println!("{} {} ({})", p.id, p.title, p.url);
                    }
                }
            }
        }
        Command::Rebind { id, page } => {
            let resolver = PageResolver::new(
                Arc::new(JsonPageIndex::load(&data_dir)),
                SuggestionRepo::new(db.clone()),
            );
            let outcome = resolver.rebind(&id, &page)?;
            let s = outcome.suggestion();
            let target = s.target_page.as_ref().map(|p| p.as_str()).unwrap_or("-");
            println!("{} -> {}", s.id, target);
        }
        Command::Preview { id } => {
            let s = controller.suggestions().get(&id)?;
            let blocks = lore_render::preview(&s.proposed_content);
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Command::Diff { id, unified } => {
            let s = controller.suggestions().get(&id)?;
            if unified {
                for line in lore_render::unified(&s.current_content, &s.proposed_content) {
                    let sign = match line.kind {
                        lore_render::LineKind::Removed => '-',
                        lore_render::LineKind::Added => '+',
                    };
                    println!("{}{:>4} {}", sign, line.number, line.text);
                }
            } else {
                let view = lore_render::side_by_side(&s.current_content, &s.proposed_content);
                println!("--- current ---\n{}", view.current);
                println!("--- proposed ---\n{}", view.proposed);
            }
        }
        Command::Activity { limit } => {
            let entries = controller.activity().recent(limit)?;
            let buckets = projector::bucket(entries, Utc::now());
            for (label, group) in [
                ("today", &buckets.today),
                ("yesterday", &buckets.yesterday),
                ("last 7 days", &buckets.last7_days),
                ("older", &buckets.older),
            ] {
                if group.is_empty() {
                    continue;
                }
                println!("{label}:");
                for e in group {
                    let actor = e.actor_name.as_deref().unwrap_or("-");
                    println!(
                        "  {} {} {} by {} at {}",
                        e.suggestion_id,
                        e.resulting_status,
                        e.title,
                        actor,
                        e.occurred_at.to_rfc3339()
                    );
                }
            }
        }
        Command::Usage { team, plan } => {
            usage.get_or_create(&team, plan)?;
            let snapshot = usage.snapshot(&team)?;
            let now = Utc::now();
            for dim in [
                QuotaDimension::Suggestions,
                QuotaDimension::Seats,
                QuotaDimension::Sources,
            ] {
                let q = lore_engine::quota::evaluate(&snapshot, dim, now);
                let limit = q
                    .limit
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "unlimited".into());
                let mut flags = String::new();
                if q.exceeded {
                    flags.push_str(" EXCEEDED");
                } else if q.warn {
                    flags.push_str(" WARN");
                }
                println!("{:<12} {}/{} ({}%){}", dim.to_string(), q.used, limit, q.percent, flags);
            }
        }
    }

    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
