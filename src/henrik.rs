use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AppConfig, MAX_HISTORY_SIZE};
use crate::http_cache::{CachedResponse, HttpCache};
use crate::match_record::MatchRecord;

/// Riot account as returned by the account endpoint and kept in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub puuid: String,
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub account_level: Option<u32>,
}

impl Account {
    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.name, self.tag)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not found")]
    NotFound,
    #[error("provider returned http {status}: {message}")]
    Status { status: u16, message: String },
    #[error("provider request failed: {0:#}")]
    Request(anyhow::Error),
    #[error("provider payload could not be decoded: {0:#}")]
    Decode(anyhow::Error),
}

/// Upstream source of accounts and match histories.
pub trait MatchProvider {
    fn fetch_account(&self, name: &str, tag: &str) -> Result<Account, ProviderError>;

    fn fetch_match_history(
        &self,
        region: &str,
        puuid: &str,
        size: u8,
    ) -> Result<Vec<MatchRecord>, ProviderError>;
}

/// HenrikDev unofficial Valorant API.
pub struct HenrikClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    cache: Option<HttpCache>,
}

impl HenrikClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            cache: None,
        }
    }

    pub fn from_config(client: Client, cfg: &AppConfig) -> Self {
        let mut out = Self::new(client, cfg.base_url.clone(), cfg.api_key.clone());
        if cfg.http_cache {
            out = out.with_cache(HttpCache::open_default());
        }
        out
    }

    pub fn with_cache(mut self, cache: HttpCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn account_url(&self, name: &str, tag: &str) -> String {
        format!(
            "{}/valorant/v1/account/{}/{}",
            self.base_url,
            urlencoding::encode(name.trim()),
            urlencoding::encode(tag.trim())
        )
    }

    pub fn match_history_url(&self, region: &str, puuid: &str, size: u8) -> String {
        format!(
            "{}/valorant/v3/by-puuid/matches/{}/{}?size={}",
            self.base_url,
            urlencoding::encode(region.trim()),
            urlencoding::encode(puuid.trim()),
            size.clamp(1, MAX_HISTORY_SIZE)
        )
    }

    fn get(&self, url: &str) -> Result<CachedResponse, ProviderError> {
        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| vec![("Authorization", key)])
            .unwrap_or_default();

        let resp = match self.cache.as_ref() {
            Some(cache) => cache
                .fetch(&self.client, url, &headers)
                .map_err(ProviderError::Request)?,
            None => {
                let mut req = self.client.get(url);
                for (name, value) in &headers {
                    req = req.header(*name, *value);
                }
                let resp = req
                    .send()
                    .context("request failed")
                    .map_err(ProviderError::Request)?;
                let status = resp.status();
                let body = resp
                    .text()
                    .context("failed reading body")
                    .map_err(ProviderError::Request)?;
                CachedResponse {
                    status,
                    body,
                    from_cache: false,
                }
            }
        };

        debug!(url, status = resp.status.as_u16(), cached = resp.from_cache, "provider response");
        if resp.status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if !resp.status.is_success() {
            return Err(ProviderError::Status {
                status: resp.status.as_u16(),
                message: error_message(&resp.body),
            });
        }
        Ok(resp)
    }
}

impl MatchProvider for HenrikClient {
    fn fetch_account(&self, name: &str, tag: &str) -> Result<Account, ProviderError> {
        let resp = self.get(&self.account_url(name, tag))?;
        let account = parse_account_json(&resp.body)
            .map_err(ProviderError::Decode)?
            .ok_or(ProviderError::NotFound)?;
        info!(puuid = %account.puuid, "account resolved from provider");
        Ok(account)
    }

    fn fetch_match_history(
        &self,
        region: &str,
        puuid: &str,
        size: u8,
    ) -> Result<Vec<MatchRecord>, ProviderError> {
        let resp = self.get(&self.match_history_url(region, puuid, size))?;
        let matches = parse_match_history_json(&resp.body).map_err(ProviderError::Decode)?;
        info!(puuid, count = matches.len(), "match history fetched");
        Ok(matches)
    }
}

/// `{"status":200,"data":{...}}`. A body without `data` means no such player.
pub fn parse_account_json(raw: &str) -> anyhow::Result<Option<Account>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid account json")?;
    let Some(data) = root.get("data").filter(|d| d.is_object()) else {
        return Ok(None);
    };
    let text = |key: &str| {
        data.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let puuid = text("puuid");
    if puuid.is_empty() {
        return Ok(None);
    }
    Ok(Some(Account {
        puuid,
        name: text("name"),
        tag: text("tag"),
        region: data
            .get("region")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        account_level: data
            .get("account_level")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok()),
    }))
}

/// `{"status":200,"data":[match, ...]}` or a bare array of matches.
pub fn parse_match_history_json(raw: &str) -> anyhow::Result<Vec<MatchRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid match history json")?;
    let list = match &root {
        Value::Array(items) => Some(items),
        other => other.get("data").and_then(|d| d.as_array()),
    };
    Ok(list
        .map(|items| items.iter().map(MatchRecord::from_value).collect())
        .unwrap_or_default())
}

fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
    });
    from_json.unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_percent_encoded_and_size_clamped() {
        let client = HenrikClient::new(Client::new(), "https://api.test", None);
        assert_eq!(
            client.account_url("Hide on bush", "KR 1"),
            "https://api.test/valorant/v1/account/Hide%20on%20bush/KR%201"
        );
        assert_eq!(
            client.match_history_url("kr", "abc", 50),
            "https://api.test/valorant/v3/by-puuid/matches/kr/abc?size=20"
        );
        assert_eq!(
            client.account_url(" Zeta/Ω ", "#1 "),
            "https://api.test/valorant/v1/account/Zeta%2F%CE%A9/%231"
        );
    }

    #[test]
    fn error_message_prefers_provider_text() {
        assert_eq!(
            error_message(r#"{"errors":[{"message":"Rate limited"}]}"#),
            "Rate limited"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
