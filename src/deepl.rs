use crate::backend::Translator;
use crate::config::TranslateConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DeeplResponse {
    translations: Vec<DeeplTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeeplTranslation {
    #[serde(default)]
    detected_source_language: Option<String>,
    text: String,
}

/// DeepL API 翻訳バックエンド
pub struct DeeplTranslator {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl DeeplTranslator {
    pub fn new(config: &TranslateConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("DeepL HTTPクライアント作成失敗")?;

        Ok(Self {
            api_key,
            endpoint: config.endpoint.clone(),
            client,
        })
    }
}

/// DeepLの言語コード形式（大文字）に変換
fn deepl_language(code: &str) -> String {
    code.trim().to_uppercase()
}

#[async_trait]
impl Translator for DeeplTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String> {
        let mut params = vec![
            ("text", text.to_string()),
            ("target_lang", deepl_language(target_language)),
        ];
        if let Some(source) = source_language {
            params.push(("source_lang", deepl_language(source)));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&params)
            .send()
            .await
            .context("DeepL リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("DeepL エラー: {} - {}", status, error_text);
        }

        let parsed: DeeplResponse = response
            .json()
            .await
            .context("DeepL レスポンスパース失敗")?;

        first_translation(parsed)
    }

    fn name(&self) -> &str {
        "deepl"
    }
}

fn first_translation(response: DeeplResponse) -> Result<String> {
    let translation = response
        .translations
        .into_iter()
        .next()
        .context("DeepL レスポンスに翻訳結果がありません")?;

    if let Some(detected) = &translation.detected_source_language {
        log::debug!("DeepL: 検出言語 {}", detected);
    }
    Ok(translation.text)
}
