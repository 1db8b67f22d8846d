//! The smuggle test engine: builds the URL × method × mutation matrix,
//! randomizes it, and dispatches it across a fixed worker pool with
//! per-host early termination.

use std::collections::{BTreeMap, HashMap};
use std::sync::{mpsc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::baseline::BaseTime;
use crate::config::Config;
use crate::http::client::{ClientError, RawClient};
use crate::http::method::Method;
use crate::http::probe;
use crate::http::url::TargetUrl;
use crate::sink::{Finding, FindingStatus, ScanError};

/// Mirrors the data model's `SmuggleTest`: stateless aside from the status
/// field the worker that runs it mutates exactly once.
#[derive(Debug, Clone)]
pub struct SmuggleTest {
    pub url: TargetUrl,
    pub method: Method,
    pub mutation_name: String,
    pub timeout: Duration,
    pub status: TestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Safe,
    ClTe,
    TeCl,
    Error,
}

/// Runs the full test matrix with a fresh, process-seeded RNG.
pub fn run(
    urls: &[TargetUrl],
    baselines: &BaseTime,
    mutations: &BTreeMap<String, Vec<u8>>,
    config: &Config,
) -> (Vec<Finding>, Vec<ScanError>) {
    let mut rng = seed_rng();
    run_with_rng(urls, baselines, mutations, config, &mut rng)
}

fn seed_rng() -> StdRng {
    let seed: u64 = rand::rng().random();
    StdRng::seed_from_u64(seed)
}

/// Runs the full test matrix with an explicitly-threaded RNG — the shuffle
/// becomes deterministic given a fixed seed, which is how tests exercise it.
pub fn run_with_rng(
    urls: &[TargetUrl],
    baselines: &BaseTime,
    mutations: &BTreeMap<String, Vec<u8>>,
    config: &Config,
    rng: &mut StdRng,
) -> (Vec<Finding>, Vec<ScanError>) {
    let mut tests = build_matrix(urls, baselines, mutations, config);
    tests.shuffle(rng);

    let worker_count = config.workers.max(1);
    let stop_after = config.stop_after;
    let vuln_counts: RwLock<HashMap<String, u64>> = RwLock::new(HashMap::new());

    let (finding_tx, finding_rx) = mpsc::channel::<Finding>();
    let (error_tx, error_rx) = mpsc::channel::<ScanError>();

    thread::scope(|scope| {
        let (test_tx, test_rx) = mpsc::sync_channel::<SmuggleTest>(worker_count);
        let test_rx = Mutex::new(test_rx);
        let test_rx = &test_rx;
        let vuln_counts = &vuln_counts;

        // Dispatcher: the test queue's single writer. Consults the vuln
        // counter under a reader lock before every send; a host at or past
        // `stop_after` has its remaining tests discarded, not requeued.
        scope.spawn(move || {
            for test in tests {
                if stop_after > 0 {
                    let counts = vuln_counts.read().unwrap();
                    if counts.get(test.url.canonical()).copied().unwrap_or(0) >= stop_after {
                        continue;
                    }
                }
                if test_tx.send(test).is_err() {
                    break;
                }
            }
        });

        for _ in 0..worker_count {
            let finding_tx = finding_tx.clone();
            let error_tx = error_tx.clone();
            scope.spawn(move || {
                let client = RawClient::new();
                loop {
                    let next = {
                        let rx = test_rx.lock().unwrap();
                        rx.recv()
                    };
                    let Ok(mut test) = next else { break };

                    let Some(mutation_bytes) = mutations.get(&test.mutation_name) else {
                        continue;
                    };
                    let (status, err) = classify(&client, &test, mutation_bytes);
                    test.status = status;

                    match status {
                        TestStatus::Safe => {}
                        TestStatus::Error => {
                            if let Some(err) = err {
                                tracing::debug!(url = %test.url, method = %test.method, error = %err, "transport error");
                                let _ = error_tx.send(ScanError {
                                    message: format!("{} {}: {}", test.method, test.url, err),
                                });
                            }
                        }
                        TestStatus::ClTe | TestStatus::TeCl => {
                            if stop_after > 0 {
                                let mut counts = vuln_counts.write().unwrap();
                                *counts.entry(test.url.canonical().to_string()).or_insert(0) += 1;
                            }
                            let finding_status = match status {
                                TestStatus::ClTe => FindingStatus::ClTe,
                                TestStatus::TeCl => FindingStatus::TeCl,
                                _ => unreachable!(),
                            };
                            tracing::info!(
                                url = %test.url,
                                method = %test.method,
                                mutation = %test.mutation_name,
                                status = %finding_status,
                                "desync finding"
                            );
                            let _ = finding_tx.send(Finding {
                                method: test.method,
                                url: test.url.canonical().to_string(),
                                status: finding_status,
                                mutation: test.mutation_name.clone(),
                            });
                        }
                    }
                }
            });
        }

        drop(finding_tx);
        drop(error_tx);
    });

    (finding_rx.into_iter().collect(), error_rx.into_iter().collect())
}

fn build_matrix(
    urls: &[TargetUrl],
    baselines: &BaseTime,
    mutations: &BTreeMap<String, Vec<u8>>,
    config: &Config,
) -> Vec<SmuggleTest> {
    let mut tests = Vec::new();
    for url in urls {
        let Some(base) = baselines.get(url.canonical()) else {
            continue;
        };
        let timeout = *base + config.delay;
        for method in &config.methods {
            for mutation_name in mutations.keys() {
                tests.push(SmuggleTest {
                    url: url.clone(),
                    method: *method,
                    mutation_name: mutation_name.clone(),
                    timeout,
                    status: TestStatus::Safe,
                });
            }
        }
    }
    tests
}

/// Runs the CL.TE probe, then (unless it already confirmed) the TE.CL
/// probe, classifying per the policy: report the first confirmed direction
/// and skip the other for this `(url, method, mutation)` tuple.
fn classify(
    client: &RawClient,
    test: &SmuggleTest,
    mutation_bytes: &[u8],
) -> (TestStatus, Option<ClientError>) {
    let cl_te_request = probe::cl_te(test.method, &test.url, mutation_bytes);
    let cl_te_outcome = match client.send(&test.url, &cl_te_request, test.timeout) {
        Ok(outcome) => outcome,
        Err(e) => return (TestStatus::Error, Some(e)),
    };
    if cl_te_outcome.elapsed >= test.timeout {
        return (TestStatus::ClTe, None);
    }

    let te_cl_request = probe::te_cl(test.method, &test.url, mutation_bytes);
    let te_cl_outcome = match client.send(&test.url, &te_cl_request, test.timeout) {
        Ok(outcome) => outcome,
        Err(e) => return (TestStatus::Error, Some(e)),
    };
    if te_cl_outcome.elapsed >= test.timeout {
        return (TestStatus::TeCl, None);
    }

    (TestStatus::Safe, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn url(s: &str) -> TargetUrl {
        TargetUrl::parse(s).unwrap()
    }

    #[test]
    fn build_matrix_skips_urls_without_a_baseline() {
        let urls = vec![url("http://a.example/"), url("http://b.example/")];
        let mut baselines = BaseTime::new();
        baselines.insert(url("http://a.example/").canonical().to_string(), Duration::from_millis(10));

        let mut mutations = BTreeMap::new();
        mutations.insert("m1".to_string(), b"Transfer-Encoding: chunked".to_vec());

        let config = Config {
            methods: vec![Method::GET],
            ..Config::default()
        };

        let tests = build_matrix(&urls, &baselines, &mutations, &config);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].url.canonical(), url("http://a.example/").canonical());
    }

    #[test]
    fn build_matrix_is_the_cartesian_product_of_urls_methods_mutations() {
        let urls = vec![url("http://a.example/")];
        let mut baselines = BaseTime::new();
        baselines.insert(url("http://a.example/").canonical().to_string(), Duration::from_millis(10));

        let mut mutations = BTreeMap::new();
        mutations.insert("m1".to_string(), vec![]);
        mutations.insert("m2".to_string(), vec![]);

        let config = Config {
            methods: vec![Method::GET, Method::POST],
            delay: Duration::from_secs(1),
            ..Config::default()
        };

        let tests = build_matrix(&urls, &baselines, &mutations, &config);
        assert_eq!(tests.len(), 4);
        assert!(tests.iter().all(|t| t.timeout == Duration::from_millis(1010)));
    }

    #[test]
    fn vuln_counts_type_is_a_plain_map_under_a_reader_writer_lock() {
        // Compile-time shape check: RwLock<HashMap<String, u64>> is the
        // documented concurrency primitive for the vuln counter.
        let _counts: RwLock<HashMap<String, u64>> = RwLock::new(HashMap::new());
    }
}
