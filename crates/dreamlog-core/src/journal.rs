use crate::analysis::{AnalysisOptions, AnalysisProvider};
use crate::config::AppConfig;
use crate::error::{CoreError, Result};
use crate::media::{visual_prompt, MediaGenerator};
use crate::parser::ResponseParser;
use crate::schema::{NewRecord, Record};
use crate::stats::StatsAggregator;
use crate::store::RecordStore;
use chrono::Local;
use tracing::{info, warn};

/// Ties the collaborators together: validates input, runs analysis, parses
/// the reply, generates an illustration and persists the result.
pub struct Journal<S, A, M> {
    store: S,
    analyzer: A,
    media: M,
    parser: ResponseParser,
    config: AppConfig,
}

impl<S, A, M> Journal<S, A, M>
where
    S: RecordStore,
    A: AnalysisProvider,
    M: MediaGenerator,
{
    pub fn new(store: S, analyzer: A, media: M, config: AppConfig) -> Self {
        Self {
            store,
            analyzer,
            media,
            parser: ResponseParser::new(config.parser.clone()),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Analyze, illustrate and store a new dream.
    pub async fn record(
        &self,
        owner_id: Option<&str>,
        text: &str,
        rating: Option<i64>,
    ) -> Result<Record> {
        let text = text.trim();
        let min_chars = self.config.journal.min_input_chars;
        if text.chars().count() < min_chars {
            return Err(CoreError::Validation(format!(
                "dream description must be at least {min_chars} characters"
            )));
        }
        if let Some(r) = rating {
            if !self.config.stats.is_valid_rating(r) {
                return Err(CoreError::Validation(format!(
                    "rating {r} outside {}..={}",
                    self.config.stats.rating_min, self.config.stats.rating_max
                )));
            }
        }

        let reply = if self.config.analysis.enabled {
            self.analyzer
                .analyze(text, &AnalysisOptions::default())
                .await?
        } else {
            String::new()
        };
        let parsed = self.parser.parse(&reply, text);

        let prompt = visual_prompt(&parsed, text);
        let media_url = match self.media.generate(&prompt).await {
            Ok(url) => url,
            Err(e) => {
                warn!(generator = self.media.name(), error = %e, "illustration failed, storing without media");
                String::new()
            }
        };

        let new = NewRecord {
            title: parsed.title.clone(),
            narrative: parsed.narrative_or(text).to_string(),
            raw_input: Some(text.to_string()),
            media_url,
            category_tags: parsed.categories,
            mood_tags: parsed.moods,
            rating,
            interpretation: Some(parsed.interpretation),
        };

        let id = self.store.create(owner_id, &new)?;
        info!(
            id,
            analyzer = self.analyzer.name(),
            sections = parsed.sections_found,
            title = %new.title,
            "dream recorded"
        );

        self.store
            .get(id)?
            .ok_or_else(|| CoreError::Storage(format!("record {id} missing after insert")))
    }

    pub fn list(&self, owner_id: Option<&str>) -> Result<Vec<Record>> {
        self.store.list(owner_id)
    }

    pub fn get(&self, id: i64) -> Result<Option<Record>> {
        self.store.get(id)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(id)
    }

    /// Aggregator over the local time zone with the configured thresholds.
    pub fn stats(&self) -> StatsAggregator<Local> {
        StatsAggregator::local(self.config.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::media::NoMediaGenerator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const REPLY: &str = "BAŞLIK: Uçan Balina\n\
                         SEMBOLLER: balina, gökyüzü\n\
                         DUYGULAR: huzur\n\
                         FAL: Yeni başlangıçlar seni bekliyor.\n\
                         AÇIKLAMA: Gökyüzünde süzülen bir balina gördüm.\n\
                         GÖRSEL: a whale floating above clouds";

    /// Returns a canned reply and remembers what it was asked.
    struct FakeAnalyzer {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeAnalyzer {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                reply: Err(msg.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnalysisProvider for FakeAnalyzer {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn analyze(&self, text: &str, _options: &AnalysisOptions) -> Result<String> {
            self.seen.lock().unwrap().push(text.to_string());
            self.reply.clone().map_err(CoreError::Analysis)
        }
    }

    /// Echoes the prompt back as a URL, or fails.
    struct FakeMedia {
        fail: bool,
    }

    #[async_trait]
    impl MediaGenerator for FakeMedia {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            if self.fail {
                Err(CoreError::Media("quota exhausted".to_string()))
            } else {
                Ok(format!("https://img.example/{}", prompt.len()))
            }
        }
    }

    /// Accepts inserts but never finds anything.
    struct ForgetfulStore;

    impl RecordStore for ForgetfulStore {
        fn create(&self, _owner_id: Option<&str>, _record: &NewRecord) -> Result<i64> {
            Ok(7)
        }

        fn list(&self, _owner_id: Option<&str>) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }

        fn get(&self, _id: i64) -> Result<Option<Record>> {
            Ok(None)
        }

        fn delete(&self, _id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn journal<A: AnalysisProvider, M: MediaGenerator>(
        analyzer: A,
        media: M,
    ) -> Journal<Database, A, M> {
        let store = Database::open_in_memory().expect("failed to open in-memory db");
        Journal::new(store, analyzer, media, AppConfig::default())
    }

    #[tokio::test]
    async fn test_record_runs_full_pipeline() {
        let j = journal(FakeAnalyzer::replying(REPLY), FakeMedia { fail: false });

        let record = j
            .record(Some("alice"), "  gökyüzünde bir balina uçuyordu  ", Some(9))
            .await
            .unwrap();

        assert!(record.id > 0);
        assert_eq!(record.owner_id.as_deref(), Some("alice"));
        assert_eq!(record.title, "Uçan Balina");
        assert_eq!(record.category_tags, vec!["balina", "gökyüzü"]);
        assert_eq!(record.mood_tags, vec!["huzur"]);
        assert_eq!(record.narrative, "Gökyüzünde süzülen bir balina gördüm.");
        assert_eq!(
            record.interpretation.as_deref(),
            Some("Yeni başlangıçlar seni bekliyor.")
        );
        assert_eq!(record.raw_input.as_deref(), Some("gökyüzünde bir balina uçuyordu"));
        assert_eq!(record.rating, Some(9));
        assert!(record.media_url.starts_with("https://img.example/"));

        // input is trimmed before analysis
        let seen = j.analyzer().seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["gökyüzünde bir balina uçuyordu"]);

        assert_eq!(j.list(Some("alice")).unwrap().len(), 1);
        assert_eq!(j.get(record.id).unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_record_rejects_short_input() {
        let j = journal(FakeAnalyzer::replying(REPLY), NoMediaGenerator);

        let err = j.record(None, "   kısa    ", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(j.analyzer().seen.lock().unwrap().is_empty());
        assert!(j.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_rejects_out_of_range_rating() {
        let j = journal(FakeAnalyzer::replying(REPLY), NoMediaGenerator);

        for rating in [0, 11, -1] {
            let err = j
                .record(None, "a long enough dream text", Some(rating))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
        assert!(j.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_propagates_analysis_failure() {
        let j = journal(FakeAnalyzer::failing("timeout"), NoMediaGenerator);

        let err = j
            .record(None, "a long enough dream text", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Analysis(_)));
        assert!(j.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_media_failure_still_stores_record() {
        let j = journal(FakeAnalyzer::replying(REPLY), FakeMedia { fail: true });

        let record = j
            .record(None, "a long enough dream text", None)
            .await
            .unwrap();
        assert!(record.media_url.is_empty());
        assert_eq!(record.title, "Uçan Balina");
    }

    #[tokio::test]
    async fn test_record_missing_after_insert_is_storage_error() {
        let j = Journal::new(
            ForgetfulStore,
            FakeAnalyzer::replying(REPLY),
            NoMediaGenerator,
            AppConfig::default(),
        );

        let err = j
            .record(None, "a long enough dream text", None)
            .await
            .unwrap_err();
        match err {
            CoreError::Storage(msg) => assert!(msg.contains("record 7")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unlabelled_reply_uses_fallbacks() {
        let j = journal(
            FakeAnalyzer::replying("I cannot help with that."),
            NoMediaGenerator,
        );

        let record = j
            .record(None, "Ormanda kayboldum. Sonra bir ev buldum.", Some(4))
            .await
            .unwrap();
        assert_eq!(record.title, "Ormanda kayboldum");
        assert!(record.category_tags.is_empty());
        assert_eq!(
            record.interpretation.as_deref(),
            Some("Rüyanız ilginç semboller içeriyor.")
        );
        assert_eq!(record.narrative, "Ormanda kayboldum. Sonra bir ev buldum.");
    }

    #[tokio::test]
    async fn test_analysis_disabled_skips_provider() {
        let mut config = AppConfig::default();
        config.analysis.enabled = false;
        let store = Database::open_in_memory().unwrap();
        let j = Journal::new(store, FakeAnalyzer::replying(REPLY), NoMediaGenerator, config);

        let record = j
            .record(None, "Bir kuleye tırmandım.", None)
            .await
            .unwrap();
        assert!(j.analyzer().seen.lock().unwrap().is_empty());
        assert_eq!(record.title, "Bir kuleye tırmandım");
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let j = journal(FakeAnalyzer::replying(REPLY), NoMediaGenerator);
        let a = j.record(None, "first dream of the week", Some(8)).await.unwrap();
        j.record(None, "second dream of the week", Some(6)).await.unwrap();

        let records = j.list(None).unwrap();
        let summary = j.stats().summary(&records);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average_rating, 7.0);
        assert_eq!(summary.top_category, "balina");

        j.delete(a.id).unwrap();
        j.delete(a.id).unwrap();
        assert_eq!(j.list(None).unwrap().len(), 1);
        assert!(j.get(a.id).unwrap().is_none());
    }
}
