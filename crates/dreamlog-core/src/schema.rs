use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StatsConfig;

// -- Database model types --

/// One journal entry plus the fields derived from its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    /// `None` for guest records.
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub narrative: String,
    pub raw_input: Option<String>,
    pub media_url: String,
    /// "Symbols" in the analysis reply.
    pub category_tags: Vec<String>,
    /// "Emotions" in the analysis reply.
    pub mood_tags: Vec<String>,
    /// Raw stored rating ("vividness"). May be absent or outside the scale.
    pub rating: Option<i64>,
    /// "Fortune" in the analysis reply.
    pub interpretation: Option<String>,
}

impl Record {
    /// The rating if it lies within the configured scale.
    pub fn valid_rating(&self, scale: &StatsConfig) -> Option<i64> {
        self.rating.filter(|r| scale.is_valid_rating(*r))
    }

    /// Rating for display: the stored value, or the mid-scale default.
    pub fn rating_or_default(&self, scale: &StatsConfig) -> i64 {
        self.valid_rating(scale).unwrap_or(scale.default_rating)
    }
}

/// Insert DTO: fields needed to create a new record. `id` and `created_at`
/// are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub title: String,
    pub narrative: String,
    pub raw_input: Option<String>,
    pub media_url: String,
    pub category_tags: Vec<String>,
    pub mood_tags: Vec<String>,
    pub rating: Option<i64>,
    pub interpretation: Option<String>,
}

// -- Derived statistics --

/// Placeholder shown when no record carries a tag.
pub const NO_TAG: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    /// Mean valid rating rounded to one decimal, `0.0` when none qualify.
    pub average_rating: f64,
    pub top_category: String,
    pub top_mood: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    Categories,
    Moods,
}

impl TagField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "categories" | "symbols" => Some(TagField::Categories),
            "moods" | "emotions" => Some(TagField::Moods),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramEntry {
    pub label: String,
    pub count: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    /// Short weekday name, e.g. `Mon`.
    pub label: String,
    pub record_count: u32,
    /// Mean valid rating for the day rounded to an integer, `0` when none.
    pub average_rating: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthStats {
    pub year: i32,
    pub month: u32,
    pub total: usize,
    pub lucid: usize,
}

/// A gallery filter chip: combined category and mood counts keyed by the
/// lowercased tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagFilter {
    pub key: String,
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstDream,
    DreamStreak,
    LucidMaster,
    DeepDreamer,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 4] = [
        AchievementKind::FirstDream,
        AchievementKind::DreamStreak,
        AchievementKind::LucidMaster,
        AchievementKind::DeepDreamer,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AchievementKind::FirstDream => "First Dream",
            AchievementKind::DreamStreak => "Dream Streak",
            AchievementKind::LucidMaster => "Lucid Master",
            AchievementKind::DeepDreamer => "Deep Dreamer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementKind::FirstDream => "Recorded your first dream",
            AchievementKind::DreamStreak => "7 days in a row",
            AchievementKind::LucidMaster => "5 lucid dreams",
            AchievementKind::DeepDreamer => "25 total dreams",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub kind: AchievementKind,
    pub title: String,
    pub description: String,
    pub earned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DreamerLevel {
    Novice,
    Explorer,
    Mystic,
    Master,
    LucidLegend,
    Oracle,
}

impl DreamerLevel {
    /// Level reached after recording `total` dreams.
    pub fn for_total(total: usize) -> Self {
        match total {
            0 => DreamerLevel::Novice,
            1..=4 => DreamerLevel::Explorer,
            5..=14 => DreamerLevel::Mystic,
            15..=29 => DreamerLevel::Master,
            30..=49 => DreamerLevel::LucidLegend,
            _ => DreamerLevel::Oracle,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DreamerLevel::Novice => "Dream Novice",
            DreamerLevel::Explorer => "Dream Explorer",
            DreamerLevel::Mystic => "Mystic Dreamer",
            DreamerLevel::Master => "Dream Master",
            DreamerLevel::LucidLegend => "Lucid Legend",
            DreamerLevel::Oracle => "Dream Oracle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    HighVividness,
    RecurringTheme,
    EmotionalTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
}

/// Everything the profile and home views show, computed in one pass over
/// the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub summary: Summary,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub lucid_count: usize,
    pub level: DreamerLevel,
    pub level_title: String,
    pub achievements: Vec<Achievement>,
    pub insights: Vec<Insight>,
}
