use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use dreamlog_core::config::{init_logging, AppConfig, StatsConfig};
use dreamlog_core::schema::{DailyPoint, MonthStats, Overview, Record, TagField, TagFilter};
use dreamlog_core::{Database, Journal, NoMediaGenerator, OllamaAnalysisClient, ResponseParser};
use serde::Serialize;
use tracing::{info, warn};

type CliJournal = Journal<Database, OllamaAnalysisClient, NoMediaGenerator>;

/// Ten years of daily points.
const MAX_SERIES_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(name = "dreamlog", about = "Dream journal with model-assisted analysis")]
struct Cli {
    /// Use this config file instead of ~/.dreamlog/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze and store a new dream
    Record {
        /// Free-form dream description
        text: String,
        /// Vividness on the configured scale
        #[arg(long)]
        rating: Option<i64>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List stored dreams, newest first
    List {
        #[arg(long)]
        owner: Option<String>,
        /// Only dreams carrying this category or mood
        #[arg(long)]
        tag: Option<String>,
        /// One line per dream instead of JSON
        #[arg(long)]
        brief: bool,
    },
    /// Delete a dream by id
    Delete { id: i64 },
    /// Profile overview, daily series and tag filters
    Stats {
        #[arg(long)]
        owner: Option<String>,
        /// Length of the daily series (defaults to stats.window_days)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_SERIES_DAYS))]
        days: Option<u32>,
    },
    /// Most frequent symbols or emotions
    Themes {
        #[arg(long)]
        owner: Option<String>,
        /// categories | moods
        #[arg(long, default_value = "categories")]
        field: String,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Parse a saved analysis reply without calling the model
    Parse {
        file: PathBuf,
        /// The dream text the reply was produced for
        #[arg(long, default_value = "")]
        input: String,
    },
    /// Check that the analysis service is reachable
    Health,
}

#[derive(Serialize)]
struct StatsReport {
    overview: Overview,
    daily: Vec<DailyPoint>,
    this_month: MonthStats,
    filters: Vec<TagFilter>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Command::Record {
            text,
            rating,
            owner,
        } => run_record(config, &text, rating, owner.as_deref()).await,
        Command::List { owner, tag, brief } => {
            run_list(config, owner.as_deref(), tag.as_deref(), brief)
        }
        Command::Delete { id } => run_delete(config, id),
        Command::Stats { owner, days } => run_stats(config, owner.as_deref(), days),
        Command::Themes { owner, field, top } => {
            run_themes(config, owner.as_deref(), &field, top)
        }
        Command::Parse { file, input } => run_parse(config, &file, &input),
        Command::Health => run_health(config).await,
    }
}

fn open_journal(config: AppConfig) -> anyhow::Result<CliJournal> {
    config.ensure_dirs()?;
    let db_path = config.db_path()?;
    let db = Database::open(&db_path)?;
    info!(path = %db_path.display(), "database opened");

    let analyzer = OllamaAnalysisClient::new(&config.analysis);
    Ok(Journal::new(db, analyzer, NoMediaGenerator, config))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_record(
    config: AppConfig,
    text: &str,
    rating: Option<i64>,
    owner: Option<&str>,
) -> anyhow::Result<()> {
    let journal = open_journal(config)?;
    let record = journal.record(owner, text, rating).await?;
    print_json(&record)
}

/// `#12  2024-03-15  Uçan Balina  (7/10)  balina, gökyüzü | huzur`
fn brief_line(record: &Record, scale: &StatsConfig) -> String {
    format!(
        "#{}  {}  {}  ({}/{})  {} | {}",
        record.id,
        record.created_at.with_timezone(&Local).format("%Y-%m-%d"),
        record.title,
        record.rating_or_default(scale),
        scale.rating_max,
        record.category_tags.join(", "),
        record.mood_tags.join(", "),
    )
}

fn run_list(
    config: AppConfig,
    owner: Option<&str>,
    tag: Option<&str>,
    brief: bool,
) -> anyhow::Result<()> {
    let journal = open_journal(config)?;
    let records = journal.list(owner)?;

    let selected: Vec<&Record> = match tag {
        Some(tag) => journal.stats().filter_by_tag(&records, tag),
        None => records.iter().collect(),
    };

    if brief {
        for record in selected {
            println!("{}", brief_line(record, &journal.config().stats));
        }
        Ok(())
    } else {
        print_json(&selected)
    }
}

fn run_delete(config: AppConfig, id: i64) -> anyhow::Result<()> {
    let journal = open_journal(config)?;
    if journal.get(id)?.is_none() {
        warn!(id, "no such record");
    }
    journal.delete(id)?;
    println!("Deleted record #{id}");
    Ok(())
}

fn run_stats(config: AppConfig, owner: Option<&str>, days: Option<u32>) -> anyhow::Result<()> {
    let journal = open_journal(config)?;
    let records = journal.list(owner)?;
    let window_days = days.unwrap_or(journal.config().stats.window_days);
    let gallery_top_n = journal.config().stats.gallery_top_n;

    let stats = journal.stats();
    let today = stats.today();
    let report = StatsReport {
        overview: stats.overview(&records, today),
        daily: stats.daily_series(&records, window_days, today)?,
        this_month: stats.month_stats(&records, today.year(), today.month())?,
        filters: stats.gallery_filters(&records, gallery_top_n),
    };
    print_json(&report)
}

fn run_themes(
    config: AppConfig,
    owner: Option<&str>,
    field: &str,
    top: Option<usize>,
) -> anyhow::Result<()> {
    let Some(field) = TagField::parse(field) else {
        anyhow::bail!("unknown field '{field}', expected 'categories' or 'moods'");
    };
    let journal = open_journal(config)?;
    let records = journal.list(owner)?;
    let top_n = top.unwrap_or(journal.config().stats.histogram_top_n);

    let histogram = journal.stats().histogram(&records, field, top_n);
    print_json(&histogram)
}

fn run_parse(config: AppConfig, file: &Path, input: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let parsed = ResponseParser::new(config.parser).parse(&raw, input);
    print_json(&parsed)
}

async fn run_health(config: AppConfig) -> anyhow::Result<()> {
    let client = OllamaAnalysisClient::new(&config.analysis);

    if !client.health_check().await? {
        anyhow::bail!(
            "Ollama is not reachable at {}. Start Ollama and ensure '{}' model is pulled.",
            config.analysis.ollama_url,
            config.analysis.model,
        );
    }

    println!(
        "Ollama reachable at {} (model '{}')",
        config.analysis.ollama_url, config.analysis.model
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_record(rating: Option<i64>) -> Record {
        Record {
            id: 12,
            owner_id: None,
            created_at: Utc::now(),
            title: "Uçan Balina".to_string(),
            narrative: String::new(),
            raw_input: None,
            media_url: String::new(),
            category_tags: vec!["balina".to_string(), "gökyüzü".to_string()],
            mood_tags: vec!["huzur".to_string()],
            rating,
            interpretation: None,
        }
    }

    #[test]
    fn test_stats_days_is_bounded() {
        assert!(Cli::try_parse_from(["dreamlog", "stats", "--days", "30"]).is_ok());
        assert!(Cli::try_parse_from(["dreamlog", "stats", "--days", "3660"]).is_ok());
        assert!(Cli::try_parse_from(["dreamlog", "stats", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["dreamlog", "stats", "--days", "50000000"]).is_err());
    }

    #[test]
    fn test_brief_line_shows_default_rating() {
        let scale = StatsConfig::default();

        let rated = brief_line(&make_record(Some(7)), &scale);
        assert!(rated.starts_with("#12  "));
        assert!(rated.contains("Uçan Balina  (7/10)  balina, gökyüzü | huzur"));

        // missing and out-of-range ratings display as the mid-scale default
        assert!(brief_line(&make_record(None), &scale).contains("(5/10)"));
        assert!(brief_line(&make_record(Some(42)), &scale).contains("(5/10)"));
    }
}
