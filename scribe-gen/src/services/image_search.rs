//! Image search client
//!
//! Keyword image lookup against the Baidu image search JSON endpoint. The first
//! hit's thumbnail URL is used. Any failure (network, status, parse, no hits)
//! is reported as "not found"; the placeholder resolver removes the marker.

use crate::types::MediaLookup;
use async_trait::async_trait;
use scribe_common::config::MediaConfig;
use scribe_common::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Browser user agent; the endpoint rejects unknown agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REFERER: &str = "https://image.baidu.com/";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchHit {
    #[serde(rename = "thumbURL", default)]
    thumb_url: Option<String>,
}

/// Baidu image search client
pub struct ImageSearchClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl ImageSearchClient {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn query<'a>(keyword: &'a str, log_id: &'a str) -> [(&'static str, &'a str); 17] {
        [
            ("tn", "resultjson_com"),
            ("logid", log_id),
            ("ipn", "rj"),
            ("ct", "201326592"),
            ("fp", "result"),
            ("queryWord", keyword),
            ("cl", "2"),
            ("lm", "-1"),
            ("ie", "utf-8"),
            ("oe", "utf-8"),
            ("st", "-1"),
            ("ic", "0"),
            ("word", keyword),
            ("istype", "2"),
            ("pn", "0"),
            ("rn", "1"),
            ("nc", "1"),
        ]
    }

    async fn search(&self, keyword: &str) -> std::result::Result<Option<String>, String> {
        let log_id = chrono::Utc::now().timestamp_millis().to_string();

        let response = self
            .http_client
            .get(&self.endpoint)
            .header(reqwest::header::REFERER, REFERER)
            .query(&Self::query(keyword, &log_id))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(first_thumbnail(&body))
    }
}

/// First non-empty thumbnail URL in a search response body
///
/// The endpoint sometimes emits `\'`, which is not a valid JSON escape.
pub fn first_thumbnail(body: &str) -> Option<String> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .or_else(|_| serde_json::from_str(&body.replace("\\'", "'")))
        .ok()?;

    parsed
        .data
        .into_iter()
        .next()
        .and_then(|hit| hit.thumb_url)
        .filter(|url| !url.trim().is_empty())
}

#[async_trait]
impl MediaLookup for ImageSearchClient {
    fn name(&self) -> &'static str {
        "baidu-image"
    }

    async fn lookup(&self, keyword: &str) -> Option<String> {
        match self.search(keyword).await {
            Ok(Some(url)) => {
                debug!(keyword = %keyword, url = %url, "Image found");
                Some(url)
            }
            Ok(None) => {
                debug!(keyword = %keyword, "No image hits");
                None
            }
            Err(e) => {
                debug!(keyword = %keyword, error = %e, "Image search failed");
                None
            }
        }
    }
}
