use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{AnalysisReport, analyze};
use crate::config::{DetectionConfig, MAX_HISTORY_SIZE};
use crate::henrik::{Account, MatchProvider, ProviderError};
use crate::store::{AccountStore, StoreStatus};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("player not found")]
    NotFound,
    #[error(transparent)]
    Provider(ProviderError),
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => ServiceError::NotFound,
            other => ServiceError::Provider(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSource {
    Cached,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountLookup {
    pub account: Account,
    pub source: AccountSource,
}

/// Glue between provider, store and the analysis engine.
pub struct AbuseService<P, S> {
    provider: P,
    store: S,
    detection: DetectionConfig,
    history_size: u8,
}

impl<P: MatchProvider, S: AccountStore> AbuseService<P, S> {
    pub fn new(provider: P, store: S, detection: DetectionConfig, history_size: u8) -> Self {
        Self {
            provider,
            store,
            detection,
            history_size: history_size.clamp(1, MAX_HISTORY_SIZE),
        }
    }

    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lookup_account(&self, name: &str, tag: &str) -> Result<AccountLookup, ServiceError> {
        let (name, tag) = (name.trim(), tag.trim());
        if name.is_empty() || tag.is_empty() {
            return Err(ServiceError::InvalidInput("name and tag are required"));
        }

        match self.store.find_account(name, tag) {
            Ok(Some(account)) => {
                info!(puuid = %account.puuid, "account served from store");
                return Ok(AccountLookup {
                    account,
                    source: AccountSource::Cached,
                });
            }
            Ok(None) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "account cache read failed"),
        }

        let account = self.provider.fetch_account(name, tag)?;
        if let Err(err) = self.store.save_account(&account) {
            warn!(error = %format!("{err:#}"), "account cache write failed");
        }
        Ok(AccountLookup {
            account,
            source: AccountSource::Provider,
        })
    }

    pub fn analyze_player(&self, puuid: &str, region: &str) -> Result<AnalysisReport, ServiceError> {
        let puuid = puuid.trim();
        if puuid.is_empty() {
            return Err(ServiceError::InvalidInput("puuid is required"));
        }
        let region = region.trim();
        if region.is_empty() {
            return Err(ServiceError::InvalidInput("region is required"));
        }

        let matches = self
            .provider
            .fetch_match_history(region, puuid, self.history_size)?;
        match self.store.save_matches(puuid, &matches) {
            Ok(written) => info!(puuid, written, "match history cached"),
            Err(err) => warn!(error = %format!("{err:#}"), "match cache write failed"),
        }
        Ok(analyze(&matches, puuid, &self.detection))
    }

    /// Offline analysis over whatever the store holds for `puuid`.
    pub fn analyze_cached(&self, puuid: &str) -> Result<AnalysisReport, ServiceError> {
        let puuid = puuid.trim();
        if puuid.is_empty() {
            return Err(ServiceError::InvalidInput("puuid is required"));
        }
        let matches = self.store.load_matches(puuid).map_err(ServiceError::Store)?;
        Ok(analyze(&matches, puuid, &self.detection))
    }

    pub fn db_status(&self) -> StoreStatus {
        match self.store.status() {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "store status unavailable");
                StoreStatus {
                    connected: false,
                    players_count: 0,
                    matches_count: 0,
                }
            }
        }
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }
}
