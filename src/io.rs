//! Newline-delimited URL input. Malformed lines produce an `Err` the caller
//! logs and skips — this function itself never logs.

use std::io::BufRead;

use crate::http::url::{TargetUrl, UrlError};

pub fn read_urls(reader: impl BufRead) -> Vec<Result<TargetUrl, UrlError>> {
    reader
        .lines()
        .map_while(Result::ok)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .map(|line| TargetUrl::parse(&line))
        .collect()
}
