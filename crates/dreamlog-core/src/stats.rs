use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Datelike, Days, Local, NaiveDate, TimeZone, Utc};

use crate::config::StatsConfig;
use crate::error::{CoreError, Result};
use crate::schema::{
    Achievement, AchievementKind, DailyPoint, DreamerLevel, HistogramEntry, Insight, InsightKind,
    MonthStats, Overview, Record, Summary, TagField, TagFilter, NO_TAG,
};

const STREAK_BADGE_DAYS: u32 = 7;
const LUCID_BADGE_COUNT: usize = 5;
const DEEP_DREAMER_COUNT: usize = 25;

/// Occurrence count of one case-insensitively merged tag.
#[derive(Debug)]
struct TagCount {
    key: String,
    label: String,
    count: u32,
}

/// Tag counts kept in first-appearance order.
#[derive(Debug, Default)]
struct TagTally {
    entries: Vec<TagCount>,
    index: HashMap<String, usize>,
    total: u32,
}

impl TagTally {
    fn add(&mut self, tag: &str) {
        let label = tag.trim();
        if label.is_empty() {
            return;
        }
        let key = label.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(TagCount {
                    key,
                    label: label.to_string(),
                    count: 1,
                });
            }
        }
        self.total += 1;
    }

    fn extend<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            self.add(tag);
        }
    }

    /// Highest count; the earliest tag wins a tie.
    fn top(&self) -> Option<&str> {
        let mut best: Option<&TagCount> = None;
        for entry in &self.entries {
            if best.map_or(true, |b| entry.count > b.count) {
                best = Some(entry);
            }
        }
        best.map(|b| b.label.as_str())
    }

    /// Entries by descending count, ties in first-appearance order.
    fn ranked(mut self) -> (Vec<TagCount>, u32) {
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        (self.entries, self.total)
    }
}

fn percentage(count: u32, total: u32) -> u32 {
    (100.0 * f64::from(count) / f64::from(total)).round() as u32
}

/// Computes read-only views over a collection of records.
///
/// Every operation is a pure function of the record slice it is given.
/// Calendar days are computed in the aggregator's time zone.
#[derive(Debug, Clone)]
pub struct StatsAggregator<Tz: TimeZone = Local> {
    tz: Tz,
    config: StatsConfig,
}

impl StatsAggregator<Local> {
    /// Aggregator bucketing days in the system's local time zone.
    pub fn local(config: StatsConfig) -> Self {
        Self::new(Local, config)
    }
}

impl<Tz: TimeZone> StatsAggregator<Tz> {
    pub fn new(tz: Tz, config: StatsConfig) -> Self {
        Self { tz, config }
    }

    /// Today's date in the aggregator's time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    fn day_of(&self, record: &Record) -> NaiveDate {
        record.created_at.with_timezone(&self.tz).date_naive()
    }

    fn mean_rating<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Option<f64> {
        let (sum, n) = records
            .into_iter()
            .filter_map(|r| r.valid_rating(&self.config))
            .fold((0i64, 0u32), |(sum, n), rating| (sum + rating, n + 1));
        (n > 0).then(|| sum as f64 / f64::from(n))
    }

    fn tally(records: &[Record], field: TagField) -> TagTally {
        let mut tally = TagTally::default();
        for record in records {
            match field {
                TagField::Categories => tally.extend(&record.category_tags),
                TagField::Moods => tally.extend(&record.mood_tags),
            }
        }
        tally
    }

    /// Count, average rating and most frequent category and mood.
    pub fn summary(&self, records: &[Record]) -> Summary {
        let average_rating = self
            .mean_rating(records)
            .map(|mean| (mean * 10.0).round() / 10.0)
            .unwrap_or(0.0);

        let top = |field| {
            Self::tally(records, field)
                .top()
                .unwrap_or(NO_TAG)
                .to_string()
        };

        Summary {
            count: records.len(),
            average_rating,
            top_category: top(TagField::Categories),
            top_mood: top(TagField::Moods),
        }
    }

    /// The `top_n` most frequent tags of `field` with their share of all tag
    /// occurrences.
    pub fn histogram(&self, records: &[Record], field: TagField, top_n: usize) -> Vec<HistogramEntry> {
        let (entries, total) = Self::tally(records, field).ranked();
        if total == 0 {
            return Vec::new();
        }

        entries
            .into_iter()
            .take(top_n)
            .map(|entry| HistogramEntry {
                percentage: percentage(entry.count, total),
                label: entry.label,
                count: entry.count,
            })
            .collect()
    }

    /// One point per calendar day for the `window_days` days ending at
    /// `reference_date`, oldest first.
    pub fn daily_series(
        &self,
        records: &[Record],
        window_days: u32,
        reference_date: NaiveDate,
    ) -> Result<Vec<DailyPoint>> {
        if window_days == 0 {
            return Err(CoreError::InvalidArgument(
                "window_days must be at least 1".to_string(),
            ));
        }

        let mut by_day: HashMap<NaiveDate, Vec<&Record>> = HashMap::new();
        for record in records {
            by_day.entry(self.day_of(record)).or_default().push(record);
        }

        (0..window_days)
            .rev()
            .map(|offset| {
                let date = reference_date
                    .checked_sub_days(Days::new(u64::from(offset)))
                    .ok_or_else(|| {
                        CoreError::InvalidArgument(format!(
                            "window of {window_days} days before {reference_date} is out of range"
                        ))
                    })?;
                let day_records = by_day.get(&date).map(Vec::as_slice).unwrap_or_default();
                let average_rating = self
                    .mean_rating(day_records.iter().copied())
                    .map(|mean| mean.round() as u32)
                    .unwrap_or(0);

                Ok(DailyPoint {
                    date,
                    label: date.format("%a").to_string(),
                    record_count: day_records.len() as u32,
                    average_rating,
                })
            })
            .collect()
    }

    /// Consecutive days with at least one record, counting back from
    /// `reference_date` inclusive. Zero when `reference_date` has no record.
    pub fn current_streak(&self, records: &[Record], reference_date: NaiveDate) -> u32 {
        let active: HashSet<NaiveDate> = records.iter().map(|r| self.day_of(r)).collect();

        let mut streak = 0;
        let mut day = Some(reference_date);
        while let Some(d) = day.filter(|d| active.contains(d)) {
            streak += 1;
            day = d.pred_opt();
        }
        streak
    }

    /// Longest run of consecutive active days anywhere in the history.
    pub fn longest_streak(&self, records: &[Record]) -> u32 {
        let active: BTreeSet<NaiveDate> = records.iter().map(|r| self.day_of(r)).collect();

        let mut longest = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;
        for day in active {
            run = match previous.and_then(|p| p.succ_opt()) {
                Some(next) if next == day => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(day);
        }
        longest
    }

    /// Whether a record counts as a lucid dream: a rating at or above the
    /// lucid threshold, or the lucid keyword in its text or categories.
    pub fn is_lucid(&self, record: &Record) -> bool {
        if record
            .valid_rating(&self.config)
            .is_some_and(|r| r >= self.config.lucid_rating_threshold)
        {
            return true;
        }

        let keyword = self.config.lucid_keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return false;
        }

        record.narrative.to_lowercase().contains(&keyword)
            || record
                .raw_input
                .as_deref()
                .is_some_and(|raw| raw.to_lowercase().contains(&keyword))
            || record
                .category_tags
                .iter()
                .any(|tag| tag.trim().to_lowercase() == keyword)
    }

    pub fn lucid_count(&self, records: &[Record]) -> usize {
        records.iter().filter(|r| self.is_lucid(r)).count()
    }

    pub fn achievements(&self, records: &[Record], reference_date: NaiveDate) -> Vec<Achievement> {
        let streak = self.current_streak(records, reference_date);
        let lucid = self.lucid_count(records);
        self.achievements_from(records.len(), streak, lucid)
    }

    fn achievements_from(&self, total: usize, streak: u32, lucid: usize) -> Vec<Achievement> {
        AchievementKind::ALL
            .iter()
            .map(|&kind| {
                let earned = match kind {
                    AchievementKind::FirstDream => total >= 1,
                    AchievementKind::DreamStreak => streak >= STREAK_BADGE_DAYS,
                    AchievementKind::LucidMaster => lucid >= LUCID_BADGE_COUNT,
                    AchievementKind::DeepDreamer => total >= DEEP_DREAMER_COUNT,
                };
                Achievement {
                    kind,
                    title: kind.title().to_string(),
                    description: kind.description().to_string(),
                    earned,
                }
            })
            .collect()
    }

    /// Record and lucid counts for one calendar month.
    pub fn month_stats(&self, records: &[Record], year: i32, month: u32) -> Result<MonthStats> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::InvalidArgument(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }

        let in_month: Vec<&Record> = records
            .iter()
            .filter(|r| {
                let day = self.day_of(r);
                day.year() == year && day.month() == month
            })
            .collect();

        Ok(MonthStats {
            year,
            month,
            total: in_month.len(),
            lucid: in_month.iter().filter(|r| self.is_lucid(r)).count(),
        })
    }

    /// Gallery filter chips: categories and moods counted together.
    pub fn gallery_filters(&self, records: &[Record], top_n: usize) -> Vec<TagFilter> {
        let mut tally = TagTally::default();
        for record in records {
            tally.extend(&record.category_tags);
            tally.extend(&record.mood_tags);
        }

        let (entries, _) = tally.ranked();
        entries
            .into_iter()
            .take(top_n)
            .map(|entry| TagFilter {
                key: entry.key,
                label: entry.label,
                count: entry.count,
            })
            .collect()
    }

    /// Records carrying `key` as a category or mood, case-insensitively.
    pub fn filter_by_tag<'a>(&self, records: &'a [Record], key: &str) -> Vec<&'a Record> {
        let key = key.trim().to_lowercase();
        records
            .iter()
            .filter(|r| {
                r.category_tags
                    .iter()
                    .chain(&r.mood_tags)
                    .any(|tag| tag.trim().to_lowercase() == key)
            })
            .collect()
    }

    pub fn insights(&self, records: &[Record]) -> Vec<Insight> {
        self.insights_from(&self.summary(records))
    }

    fn insights_from(&self, summary: &Summary) -> Vec<Insight> {
        let mut insights = Vec::new();

        if summary.average_rating >= self.config.high_vividness_threshold {
            insights.push(Insight {
                kind: InsightKind::HighVividness,
                title: "High Vividness".to_string(),
                description:
                    "Your dreams are vivid. Consider journaling right after waking to boost recall."
                        .to_string(),
            });
        }
        if summary.top_category != NO_TAG {
            insights.push(Insight {
                kind: InsightKind::RecurringTheme,
                title: "Recurring Theme".to_string(),
                description: format!(
                    "Frequent theme detected: {}. Reflect on its meaning for you.",
                    summary.top_category
                ),
            });
        }
        if summary.top_mood != NO_TAG {
            insights.push(Insight {
                kind: InsightKind::EmotionalTrend,
                title: "Emotional Trend".to_string(),
                description: format!("Dominant emotion appears to be {}.", summary.top_mood),
            });
        }

        insights
    }

    /// Profile/home view-model as of `reference_date`.
    pub fn overview(&self, records: &[Record], reference_date: NaiveDate) -> Overview {
        let summary = self.summary(records);
        let current_streak = self.current_streak(records, reference_date);
        let lucid_count = self.lucid_count(records);
        let level = DreamerLevel::for_total(records.len());

        Overview {
            current_streak,
            longest_streak: self.longest_streak(records),
            lucid_count,
            level,
            level_title: level.title().to_string(),
            achievements: self.achievements_from(records.len(), current_streak, lucid_count),
            insights: self.insights_from(&summary),
            summary,
        }
    }
}
