//! Per-URL baseline latency: collected once, persisted across runs as a flat
//! JSON object mapping canonical URL string to a duration in nanoseconds.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::http::client::{ClientError, RawClient};
use crate::http::probe::baseline_request;
use crate::http::url::TargetUrl;

/// No probe is classified against the baseline collector's own timeout, so
/// it only needs to be generous enough to reach a well-behaved server.
const BASELINE_TIMEOUT: Duration = Duration::from_secs(10);

pub type BaseTime = HashMap<String, Duration>;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("failed to read baseline file {0:?}: {1}")]
    Read(PathBuf, io::Error),
    #[error("failed to parse baseline file {0:?}: {1}")]
    Parse(PathBuf, serde_json::Error),
    #[error("failed to write baseline file {0:?}: {1}")]
    Write(PathBuf, io::Error),
    #[error("failed to serialize baseline map: {0}")]
    Serialize(serde_json::Error),
}

/// Reads the persisted baseline file, or an empty map if it doesn't exist
/// yet. A present-but-unparseable file is fatal.
pub fn load(path: &Path) -> Result<BaseTime, BaselineError> {
    if !path.exists() {
        return Ok(BaseTime::new());
    }
    let text = fs::read_to_string(path).map_err(|e| BaselineError::Read(path.to_path_buf(), e))?;
    let raw: HashMap<String, u128> =
        serde_json::from_str(&text).map_err(|e| BaselineError::Parse(path.to_path_buf(), e))?;
    Ok(raw
        .into_iter()
        .map(|(url, nanos)| (url, Duration::from_nanos(nanos as u64)))
        .collect())
}

/// Rewrites the baseline file atomically: write to a sibling temp file, then
/// rename over the destination.
pub fn store(path: &Path, baselines: &BaseTime) -> Result<(), BaselineError> {
    let raw: HashMap<&str, u128> = baselines
        .iter()
        .map(|(url, duration)| (url.as_str(), duration.as_nanos()))
        .collect();
    let text = serde_json::to_string_pretty(&raw).map_err(BaselineError::Serialize)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("smuggles.base");
    let tmp = dir.join(format!(".{file_name}.tmp"));

    fs::write(&tmp, text).map_err(|e| BaselineError::Write(tmp.clone(), e))?;
    fs::rename(&tmp, path).map_err(|e| BaselineError::Write(path.to_path_buf(), e))?;
    Ok(())
}

/// One URL's baseline-collection outcome, keyed by canonical URL string.
pub struct BaselineOutcome {
    pub baselines: BaseTime,
    pub errors: Vec<(String, ClientError)>,
}

/// Issues one well-formed request per URL lacking an entry in `existing`,
/// spread across a worker pool. Each URL yields at most one measurement —
/// on error the URL is simply absent from the result, skipped in phase 2.
pub fn collect_missing(urls: &[TargetUrl], existing: &BaseTime, workers: usize) -> BaselineOutcome {
    let pending: Vec<TargetUrl> = urls
        .iter()
        .filter(|u| !existing.contains_key(u.canonical()))
        .cloned()
        .collect();

    if pending.is_empty() {
        return BaselineOutcome { baselines: BaseTime::new(), errors: Vec::new() };
    }

    let worker_count = workers.max(1);
    let (result_tx, result_rx) = std::sync::mpsc::channel::<(String, Result<Duration, ClientError>)>();

    thread::scope(|scope| {
        let (test_tx, test_rx) = std::sync::mpsc::sync_channel::<TargetUrl>(worker_count);
        let test_rx = Mutex::new(test_rx);
        let test_rx = &test_rx;

        // Single producer: sends every pending URL, then drops its sender,
        // which is how workers learn there is no more work.
        scope.spawn(move || {
            for url in pending {
                if test_tx.send(url).is_err() {
                    break;
                }
            }
        });

        for _ in 0..worker_count {
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                let client = RawClient::new();
                loop {
                    let next = {
                        let rx = test_rx.lock().unwrap();
                        rx.recv()
                    };
                    let Ok(url) = next else { break };
                    let request = baseline_request(&url);
                    let outcome = client
                        .send(&url, &request, BASELINE_TIMEOUT)
                        .map(|o| o.elapsed);
                    let _ = result_tx.send((url.canonical().to_string(), outcome));
                }
            });
        }

        drop(result_tx);
    });

    let mut baselines = BaseTime::new();
    let mut errors = Vec::new();
    for (canonical, result) in result_rx {
        match result {
            Ok(elapsed) => {
                baselines.insert(canonical, elapsed);
            }
            Err(e) => errors.push((canonical, e)),
        }
    }

    BaselineOutcome { baselines, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smuggles.base");

        let mut baselines = BaseTime::new();
        baselines.insert("http://example.com:80/".to_string(), Duration::from_millis(42));
        baselines.insert("https://target.example:443/a".to_string(), Duration::from_nanos(7));

        store(&path, &baselines).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, baselines);
    }

    #[test]
    fn load_of_missing_file_is_empty_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.base");
        let loaded = load(&path).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn load_of_unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smuggles.base");
        fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn stored_file_is_byte_parseable_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smuggles.base");
        let mut baselines = BaseTime::new();
        baselines.insert("http://example.com:80/".to_string(), Duration::from_millis(5));
        store(&path, &baselines).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let _: serde_json::Value = serde_json::from_str(&text).unwrap();
    }

    #[test]
    fn collect_missing_skips_urls_already_baselined() {
        let url = TargetUrl::parse("http://127.0.0.1:1/").unwrap();
        let mut existing = BaseTime::new();
        existing.insert(url.canonical().to_string(), Duration::from_millis(1));

        let outcome = collect_missing(&[url], &existing, 4);
        assert!(outcome.baselines.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn collect_missing_records_connect_errors_for_unreachable_hosts() {
        // Port 0 never accepts connections; this should surface as a
        // transport error, not a panic or a hang.
        let url = TargetUrl::parse("http://127.0.0.1:1/").unwrap();
        let outcome = collect_missing(&[url], &BaseTime::new(), 2);
        assert!(outcome.baselines.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }
}
