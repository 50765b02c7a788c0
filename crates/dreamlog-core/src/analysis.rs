use crate::config::AnalysisConfig;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

// -- System prompt --

pub const ANALYSIS_PROMPT: &str = r#"Sen rüya analizi konusunda uzman bir psikologsun. Kullanıcının rüyasını analiz edip şu formatta yanıt vermelisin:

BAŞLIK: [Rüya için kısa ve çarpıcı bir başlık, maksimum 60 karakter]

SEMBOLLER: [Rüyadaki önemli sembolleri virgülle ayır, maksimum 5 sembol]

DUYGULAR: [Rüyadaki baskın duyguları virgülle ayır, maksimum 5 duygu]

FAL: [Rüyanın yorumu ve geleceğe dair mesaj, 2-3 cümle]

AÇIKLAMA: [Rüyanın daha detaylı ve anlaşılır hali, gerekirse eksik detayları tamamla]

GÖRSEL: [Rüyayı resmetmek için kısa bir İngilizce sahne tarifi]

Türkçe yanıt ver ve her bölümü net bir şekilde ayır."#;

/// Per-call overrides of the configured generation settings.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

/// A service that turns a free-form dream description into a labelled
/// analysis reply for the response parser.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Returns the raw reply text.
    async fn analyze(&self, text: &str, options: &AnalysisOptions) -> Result<String>;
}

// -- Ollama client --

pub struct OllamaAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl AnalysisProvider for OllamaAnalysisClient {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn analyze(&self, text: &str, options: &AnalysisOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let system_prompt = options.system_prompt.as_deref().unwrap_or(ANALYSIS_PROMPT);

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": format!("Rüya: {text}")},
            ],
            "stream": false,
            "options": {
                "temperature": options.temperature.unwrap_or(self.temperature),
                "num_predict": options.max_tokens.unwrap_or(self.max_tokens),
            }
        });

        let url = format!("{}/api/chat", self.base_url);
        debug!(model, chars = text.chars().count(), "requesting dream analysis");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Analysis(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::Analysis(format!(
                "ollama returned {status}: {body_text}"
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Analysis(format!("parse analysis response: {e}")))?;

        let content = resp_json["message"]["content"].as_str().unwrap_or("");
        if content.trim().is_empty() {
            return Err(CoreError::Analysis(
                "model did not return any output".to_string(),
            ));
        }

        Ok(content.to_string())
    }
}
