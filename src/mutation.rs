//! The mutation catalog: named `Transfer-Encoding` header obfuscations.
//!
//! Every entry is a `(name, header_line)` pair where `header_line` is the
//! literal bytes to splice into a probe template in place of a canonical
//! `Transfer-Encoding: chunked` line. `header_line` never includes the
//! terminating CRLF — the probe templates append it.

use std::collections::BTreeMap;

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MutationFilterError {
    #[error("invalid glob pattern {0:?}: {1}")]
    InvalidGlob(String, globset::Error),
    #[error("failed to build glob set: {0}")]
    Build(globset::Error),
}

/// Enumerates the full mutation catalog. Pure and allocation-only: no I/O,
/// no dependency on configuration. A `BTreeMap` keeps iteration order sorted
/// and deterministic, which the engine relies on when building a
/// reproducible test matrix from a fixed RNG seed.
pub fn generate() -> BTreeMap<String, Vec<u8>> {
    let mut mutations = BTreeMap::new();

    // Inter-token whitespace between the header name's colon and `chunked`.
    for (name, ws) in [
        ("space", b' '),
        ("tab", b'\t'),
        ("vtab", 0x0Bu8),
        ("formfeed", 0x0Cu8),
        ("cr", b'\r'),
    ] {
        let mut header = b"Transfer-Encoding:".to_vec();
        header.push(ws);
        header.extend_from_slice(b"chunked");
        mutations.insert(format!("value-ws-{name}"), header);
    }

    // A leading whitespace byte before the header name itself.
    for (name, ws) in [("space", b' '), ("tab", b'\t')] {
        let mut header = vec![ws];
        header.extend_from_slice(b"Transfer-Encoding: chunked");
        mutations.insert(format!("lineprefix-{name}"), header);
    }

    // Obsolete line folding (LWS): the value continues on the next line.
    mutations.insert(
        "folding-space".to_string(),
        b"Transfer-Encoding:\r\n chunked".to_vec(),
    );

    // Header name case and spelling permutations.
    mutations.insert(
        "case-lower".to_string(),
        b"transfer-encoding: chunked".to_vec(),
    );
    mutations.insert(
        "case-mixed".to_string(),
        b"Transfer-encoding: chunked".to_vec(),
    );
    mutations.insert(
        "case-upper".to_string(),
        b"TRANSFER-ENCODING: chunked".to_vec(),
    );
    mutations.insert(
        "case-underscore".to_string(),
        b"Transfer_Encoding: chunked".to_vec(),
    );

    // Value permutations.
    mutations.insert(
        "value-trailing-space".to_string(),
        b"Transfer-Encoding: chunked ".to_vec(),
    );
    mutations.insert(
        "value-leading-extra-space".to_string(),
        b"Transfer-Encoding:  chunked".to_vec(),
    );
    mutations.insert(
        "value-quoted".to_string(),
        b"Transfer-Encoding: \"chunked\"".to_vec(),
    );
    mutations.insert(
        "value-single-quoted".to_string(),
        b"Transfer-Encoding: 'chunked'".to_vec(),
    );
    mutations.insert(
        "value-prefix-x".to_string(),
        b"Transfer-Encoding: xchunked".to_vec(),
    );
    mutations.insert(
        "value-suffix-x".to_string(),
        b"Transfer-Encoding: chunkedx".to_vec(),
    );
    mutations.insert(
        "value-duplicate-nospace".to_string(),
        b"Transfer-Encoding: chunked,chunked".to_vec(),
    );
    mutations.insert(
        "value-duplicate-space".to_string(),
        b"Transfer-Encoding: chunked, chunked".to_vec(),
    );
    mutations.insert(
        "value-tab-separated".to_string(),
        b"Transfer-Encoding: chunked\tchunked".to_vec(),
    );
    mutations.insert(
        "value-smuggled-header".to_string(),
        b"Transfer-Encoding: chunked\r\nX-Smuggled: 1".to_vec(),
    );

    // Whitespace between the header name and its colon. Byte-exact per the
    // conformance scenario: this name and these bytes must exist verbatim.
    mutations.insert(
        "space-before-colon".to_string(),
        b"Transfer-Encoding : chunked".to_vec(),
    );

    // Duplicate Transfer-Encoding lines with conflicting values.
    mutations.insert(
        "duplicate-chunked-identity".to_string(),
        b"Transfer-Encoding: chunked\r\nTransfer-Encoding: identity".to_vec(),
    );
    mutations.insert(
        "duplicate-identity-chunked".to_string(),
        b"Transfer-Encoding: identity\r\nTransfer-Encoding: chunked".to_vec(),
    );

    mutations
}

/// Applies `enable`/`disable` glob filters over mutation names. An empty
/// `enable` list means "all names pass the enable stage"; `disable` always
/// wins when both match the same name.
pub fn filter(
    mutations: &BTreeMap<String, Vec<u8>>,
    enable: &[String],
    disable: &[String],
) -> Result<BTreeMap<String, Vec<u8>>, MutationFilterError> {
    let enable_set = build_globset(enable)?;
    let disable_set = build_globset(disable)?;

    Ok(mutations
        .iter()
        .filter(|(name, _)| {
            let is_enabled = enable.is_empty() || enable_set.is_match(name.as_str());
            let is_disabled = !disable.is_empty() && disable_set.is_match(name.as_str());
            is_enabled && !is_disabled
        })
        .map(|(name, header)| (name.clone(), header.clone()))
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, MutationFilterError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| MutationFilterError::InvalidGlob(pattern.clone(), e))?;
        builder.add(glob);
    }
    builder.build().map_err(MutationFilterError::Build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mutations = generate();
        let names: std::collections::BTreeSet<_> = mutations.keys().collect();
        assert_eq!(names.len(), mutations.len());
    }

    #[test]
    fn space_before_colon_is_byte_exact() {
        let mutations = generate();
        assert_eq!(
            mutations.get("space-before-colon").map(|v| v.as_slice()),
            Some(b"Transfer-Encoding : chunked".as_slice())
        );
    }

    #[test]
    fn header_lines_never_end_in_crlf() {
        for (name, header) in generate() {
            assert!(
                !header.ends_with(b"\r\n"),
                "mutation {name} must not include a terminating CRLF"
            );
        }
    }

    #[test]
    fn enable_disable_glob_filter_matches_scenario_f() {
        let mutations = generate();
        let filtered = filter(
            &mutations,
            &["space-*".to_string()],
            &["*-suffix".to_string()],
        )
        .unwrap();

        assert!(filtered.keys().all(|n| n.starts_with("space-")));
        assert!(filtered.keys().all(|n| !n.ends_with("-suffix")));
        assert!(filtered.contains_key("space-before-colon"));
    }

    #[test]
    fn disable_wins_over_enable_for_the_same_name() {
        let mutations = generate();
        let filtered = filter(
            &mutations,
            &["space-before-colon".to_string()],
            &["space-before-colon".to_string()],
        )
        .unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn filter_is_idempotent() {
        let mutations = generate();
        let once = filter(&mutations, &["value-*".to_string()], &[]).unwrap();
        let twice = filter(&once, &["value-*".to_string()], &[]).unwrap();
        assert_eq!(once.len(), twice.len());
        assert_eq!(once.keys().collect::<Vec<_>>(), twice.keys().collect::<Vec<_>>());
    }

    #[test]
    fn empty_enable_list_means_everything_passes_the_enable_stage() {
        let mutations = generate();
        let filtered = filter(&mutations, &[], &[]).unwrap();
        assert_eq!(filtered.len(), mutations.len());
    }

    #[test]
    fn rejects_invalid_glob_pattern() {
        let mutations = generate();
        let result = filter(&mutations, &["[".to_string()], &[]);
        assert!(result.is_err());
    }
}
