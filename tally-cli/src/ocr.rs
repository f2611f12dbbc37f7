//! OCR.space client. Failures degrade to empty text so the typed text and
//! caption can still carry a submission.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tally_core::SubmissionError;
use tracing::{debug, warn};

use crate::config::OcrSection;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

pub struct OcrClient {
    http: reqwest::Client,
    cfg: OcrSection,
    api_key: Option<String>,
}

impl OcrClient {
    pub fn new(cfg: &OcrSection) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build OCR http client")?;
        Ok(Self {
            http,
            cfg: cfg.clone(),
            api_key: cfg.resolved_api_key(),
        })
    }

    /// Recognized text of one image, or an empty string once every attempt
    /// has failed.
    pub async fn extract_text(&self, image: &[u8]) -> String {
        let Some(key) = self.api_key.as_deref() else {
            warn!(error = %SubmissionError::OcrFailed("no API key configured".into()), "skipping OCR");
            return String::new();
        };

        let attempts = self.cfg.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.attempt(key, image).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "OCR succeeded");
                    return text;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "OCR attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(2 * u64::from(attempt))).await;
                    }
                }
            }
        }
        warn!(error = %SubmissionError::OcrFailed(format!("{attempts} attempts exhausted")), "continuing without OCR text");
        String::new()
    }

    async fn attempt(&self, key: &str, image: &[u8]) -> Result<String> {
        let file = Part::bytes(image.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("apikey", key.to_string())
            .text("language", self.cfg.language.clone())
            .text("isOverlayRequired", "false")
            .text("detectOrientation", "true")
            .text("scale", "true")
            .text("OCREngine", "2")
            .part("file", file);

        let resp = self
            .http
            .post(&self.cfg.api_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("OCR request timed out after {}s", self.cfg.timeout_secs)
                } else if e.is_connect() {
                    anyhow!("cannot reach OCR service at {}", self.cfg.api_url)
                } else {
                    anyhow!("OCR request failed: {e}")
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("OCR service returned {status}: {body}");
        }
        let parsed: OcrResponse = resp.json().await.context("decode OCR response")?;
        parsed_text(parsed)
    }
}

fn parsed_text(resp: OcrResponse) -> Result<String> {
    if resp.is_errored_on_processing {
        let msg = resp
            .error_message
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("OCR processing error: {msg}");
    }
    let Some(first) = resp.parsed_results.into_iter().next() else {
        bail!("OCR response had no parsed results");
    };
    Ok(first.parsed_text)
}
