use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Built once by the entry point and handed to whoever needs it.
pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("failed to build http client")
}
