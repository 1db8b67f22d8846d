//! Result sink and error channel: the findings-log and error-log line
//! formats that downstream PoC tooling parses, per the output contract.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use thiserror::Error;

use crate::http::method::{Method, MethodError};

/// The two non-SAFE classifications a finding can carry. `Safe` and `Error`
/// never reach the sink — only a confirmed desync is a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingStatus {
    ClTe,
    TeCl,
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FindingStatus::ClTe => "CLTE",
            FindingStatus::TeCl => "TECL",
        })
    }
}

impl FromStr for FindingStatus {
    type Err = FindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLTE" => Ok(FindingStatus::ClTe),
            "TECL" => Ok(FindingStatus::TeCl),
            other => Err(FindingParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// One confirmed desync, ready to be written as a findings-log line:
/// `<METHOD> <URL> <STATUS> <MUTATION_NAME>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub method: Method,
    pub url: String,
    pub status: FindingStatus,
    pub mutation: String,
}

#[derive(Debug, Error)]
pub enum FindingParseError {
    #[error("findings line is missing a field")]
    Truncated,
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
    #[error("unknown method: {0}")]
    Method(#[from] MethodError),
}

impl Finding {
    pub fn to_line(&self) -> String {
        format!("{} {} {} {}", self.method, self.url, self.status, self.mutation)
    }

    /// Recovers `(method, url, status, mutation_name)` from the first four
    /// whitespace-separated tokens of a findings-log line.
    pub fn from_line(line: &str) -> Result<Finding, FindingParseError> {
        let mut parts = line.split_whitespace();
        let method = parts
            .next()
            .ok_or(FindingParseError::Truncated)?
            .parse::<Method>()?;
        let url = parts.next().ok_or(FindingParseError::Truncated)?.to_string();
        let status = parts.next().ok_or(FindingParseError::Truncated)?.parse::<FindingStatus>()?;
        let mutation = parts.next().ok_or(FindingParseError::Truncated)?.to_string();
        Ok(Finding { method, url, status, mutation })
    }
}

/// A transport, configuration, or input error surfaced on the error
/// channel — never a timing-positive outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub message: String,
}

impl ScanError {
    pub fn to_line(&self) -> String {
        format!("ERROR: {}", self.message)
    }
}

pub trait FindingsWriter {
    fn write_finding(&mut self, finding: &Finding) -> io::Result<()>;
}

impl<W: Write> FindingsWriter for W {
    fn write_finding(&mut self, finding: &Finding) -> io::Result<()> {
        writeln!(self, "{}", finding.to_line())
    }
}

pub trait ErrorWriter {
    fn write_error(&mut self, error: &ScanError) -> io::Result<()>;
}

impl<W: Write> ErrorWriter for W {
    fn write_error(&mut self, error: &ScanError) -> io::Result<()> {
        writeln!(self, "{}", error.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_line_matches_output_contract() {
        let finding = Finding {
            method: Method::GET,
            url: "https://example.com".to_string(),
            status: FindingStatus::ClTe,
            mutation: "lineprefix-space".to_string(),
        };
        assert_eq!(finding.to_line(), "GET https://example.com CLTE lineprefix-space");
    }

    #[test]
    fn finding_round_trips_through_from_line() {
        let finding = Finding {
            method: Method::POST,
            url: "https://target.example/path".to_string(),
            status: FindingStatus::TeCl,
            mutation: "space-before-colon".to_string(),
        };
        let parsed = Finding::from_line(&finding.to_line()).unwrap();
        assert_eq!(parsed, finding);
    }

    #[test]
    fn from_line_rejects_truncated_input() {
        let result = Finding::from_line("GET https://example.com");
        assert!(matches!(result, Err(FindingParseError::Truncated)));
    }

    #[test]
    fn error_line_is_prefixed() {
        let error = ScanError { message: "connect to example.com:80 failed".to_string() };
        assert_eq!(error.to_line(), "ERROR: connect to example.com:80 failed");
    }

    #[test]
    fn writers_append_newline() {
        let mut buf = Vec::new();
        buf.write_finding(&Finding {
            method: Method::GET,
            url: "https://example.com".to_string(),
            status: FindingStatus::ClTe,
            mutation: "case-lower".to_string(),
        })
        .unwrap();
        assert_eq!(buf, b"GET https://example.com CLTE case-lower\n".to_vec());
    }
}
