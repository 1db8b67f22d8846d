//! The configuration surface enumerated in the scanner's external
//! interfaces. `Config` is a plain struct — this crate never parses argv
//! itself; `main.rs` is the thin external collaborator that builds one from
//! a `clap`-derived CLI and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use crate::http::method::Method;

#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub methods: Vec<Method>,
    pub delay: Duration,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
    pub stop_after: u64,
    pub progress: bool,
    pub verbose: bool,
    pub debug: bool,
    pub baseline_path: PathBuf,
    pub findings_path: Option<PathBuf>,
    pub errors_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Resolved findings-log path: explicit path, else `output_dir` joined
    /// with the default filename, else the bare default filename.
    pub fn findings_output_path(&self) -> PathBuf {
        self.findings_path.clone().unwrap_or_else(|| {
            self.output_dir
                .as_ref()
                .map(|dir| dir.join("findings.log"))
                .unwrap_or_else(|| PathBuf::from("findings.log"))
        })
    }

    /// Resolved error-log path, following the same precedence as
    /// `findings_output_path`.
    pub fn errors_output_path(&self) -> PathBuf {
        self.errors_path.clone().unwrap_or_else(|| {
            self.output_dir
                .as_ref()
                .map(|dir| dir.join("errors.log"))
                .unwrap_or_else(|| PathBuf::from("errors.log"))
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: 10,
            methods: Method::defaults(),
            delay: Duration::from_secs(5),
            enable: Vec::new(),
            disable: Vec::new(),
            stop_after: 0,
            progress: false,
            verbose: false,
            debug: false,
            baseline_path: PathBuf::from("smuggles.base"),
            findings_path: None,
            errors_path: None,
            output_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.methods, Method::defaults());
        assert_eq!(config.delay, Duration::from_secs(5));
        assert_eq!(config.stop_after, 0);
        assert_eq!(config.baseline_path, PathBuf::from("smuggles.base"));
    }

    #[test]
    fn output_dir_supplies_defaults_for_unset_paths() {
        let mut config = Config::default();
        config.output_dir = Some(PathBuf::from("/tmp/scan"));
        assert_eq!(config.findings_output_path(), PathBuf::from("/tmp/scan/findings.log"));
        assert_eq!(config.errors_output_path(), PathBuf::from("/tmp/scan/errors.log"));
    }

    #[test]
    fn explicit_paths_win_over_output_dir() {
        let mut config = Config::default();
        config.output_dir = Some(PathBuf::from("/tmp/scan"));
        config.findings_path = Some(PathBuf::from("/custom/findings.log"));
        assert_eq!(config.findings_output_path(), PathBuf::from("/custom/findings.log"));
    }
}
