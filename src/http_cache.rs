use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{
    ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "valo_abuse";
const CACHE_FILE: &str = "http_cache.json";
const AGENT: &str = "valo-abuse-terminal/0.1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// Raw response as seen by the caller. Only 2xx bodies are cached.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub body: String,
    pub from_cache: bool,
}

/// Conditional-GET cache persisted next to the sqlite store.
///
/// Revalidates with `If-None-Match` / `If-Modified-Since` and serves the stored
/// body on 304. With no path it still works, in memory only.
#[derive(Debug)]
pub struct HttpCache {
    path: Option<PathBuf>,
    file: Mutex<HttpCacheFile>,
}

impl HttpCache {
    pub fn open(path: Option<PathBuf>) -> Self {
        let file = path.as_deref().map(load_cache_file).unwrap_or_default();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    pub fn open_default() -> Self {
        Self::open(app_cache_dir().map(|dir| dir.join(CACHE_FILE)))
    }

    pub fn in_memory() -> Self {
        Self::open(None)
    }

    pub fn len(&self) -> usize {
        self.file.lock().map(|f| f.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetch(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<CachedResponse> {
        let cached_entry = {
            let guard = self
                .file
                .lock()
                .map_err(|_| anyhow!("http cache lock poisoned"))?;
            guard.entries.get(url).cloned()
        };

        let mut req = client.get(url).header(USER_AGENT, AGENT);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if let Some(entry) = cached_entry.as_ref() {
            if let Some(etag) = entry.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let headers = resp.headers().clone();
        if status == StatusCode::NOT_MODIFIED {
            let Some(entry) = cached_entry else {
                return Err(anyhow!("received 304 without cache body"));
            };
            debug!(url, "served from http cache");
            self.store(url, entry.clone())?;
            return Ok(CachedResponse {
                status: StatusCode::OK,
                body: entry.body,
                from_cache: true,
            });
        }

        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Ok(CachedResponse {
                status,
                body,
                from_cache: false,
            });
        }

        let header_string = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        let entry = CacheEntry {
            body: body.clone(),
            etag: header_string(ETAG),
            last_modified: header_string(LAST_MODIFIED),
            fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
        };
        self.store(url, entry)?;
        Ok(CachedResponse {
            status,
            body,
            from_cache: false,
        })
    }

    fn store(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        guard.version = CACHE_VERSION;
        guard.entries.insert(key.to_string(), entry);
        if let Some(path) = self.path.as_ref()
            && let Err(err) = save_cache_file(path, &guard)
        {
            warn!(error = %err, "could not persist http cache");
        }
        Ok(())
    }
}

fn load_cache_file(path: &Path) -> HttpCacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &HttpCacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, path).context("swap http cache")?;
    Ok(())
}

/// `$XDG_CACHE_HOME/valo_abuse` or `~/.cache/valo_abuse`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_entries_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CACHE_FILE);

        let cache = HttpCache::open(Some(path.clone()));
        assert!(cache.is_empty());
        cache
            .store(
                "https://example.test/a",
                CacheEntry {
                    body: "{}".to_string(),
                    etag: Some("\"v1\"".to_string()),
                    last_modified: None,
                    fetched_at: 1,
                },
            )
            .expect("store entry");

        let reopened = HttpCache::open(Some(path));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn stale_version_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE);
        fs::write(&path, r#"{"version":0,"entries":{"k":{"body":"x","etag":null,"last_modified":null,"fetched_at":0}}}"#)
            .expect("write stale cache");
        assert!(HttpCache::open(Some(path)).is_empty());
    }

    #[test]
    fn garbage_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CACHE_FILE);
        fs::write(&path, "not json").expect("write garbage");
        assert!(HttpCache::open(Some(path)).is_empty());
    }
}
