//! TAP-like log parser.
//!
//! Extracts `ok` / `not ok` lines from raw CI job logs. The grammar is
//! deliberately loose: hosted log viewers prefix every line with a timestamp,
//! and the test harness formats trailers differently per platform.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::SubTestFailure;

/// ISO-8601 timestamp prefix added by the GitHub log viewer.
static TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?\s?")
        .expect("valid timestamp regex")
});

static NOT_OK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*not ok\s+(\d+)\b\s*(.*)$").expect("valid not-ok regex"));

static OK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*ok\s+(\d+)\b\s*(.*)$").expect("valid ok regex"));

/// "running foo.bats", "Running `tests/k8s/foo.bats`" ...
static RUNNING_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\brunning\s+[`'"]?([\w./-]+\.[A-Za-z][A-Za-z0-9]{0,5})[`'"]?"#)
        .expect("valid running-file regex")
});

/// A line holding nothing but a test file path.
static FILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([\w./-]+\.(?:bats|sh|bash|t|tap|py|js|mjs|ts|go|rs|rb|pl))\s*:?\s*$")
        .expect("valid file-line regex")
});

static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)(?:\s+|^)#\s*(.*)$").expect("valid directive regex"));

static DURATION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+in\s+\d+(?:\.\d+)?\s*ms\s*$").expect("valid duration regex"));

/// Test counts for one log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Structured result of parsing one log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLog {
    pub failures: Vec<SubTestFailure>,
    pub stats: TestStats,
}

/// Name and trailing directive of a TAP line.
struct TapLine {
    number: u32,
    name: String,
    comment: Option<String>,
}

impl TapLine {
    fn parse(number: &str, rest: &str) -> Self {
        let number = number.parse().unwrap_or(0);
        let rest = rest.strip_prefix("- ").unwrap_or(rest).trim();

        let (name, comment) = match DIRECTIVE.captures(rest) {
            Some(caps) => (
                caps[1].to_string(),
                Some(strip_duration(&caps[2]).to_string()).filter(|c| !c.is_empty()),
            ),
            None => (rest.to_string(), None),
        };

        let name = strip_duration(&name).trim().to_string();
        let name = if name.is_empty() {
            format!("test #{}", number)
        } else {
            name
        };

        TapLine {
            number,
            name,
            comment,
        }
    }

    fn is_skip(&self) -> bool {
        self.comment
            .as_deref()
            .map(|c| c.to_lowercase().contains("skip"))
            .unwrap_or(false)
    }

    fn is_skip_or_todo(&self) -> bool {
        self.comment
            .as_deref()
            .map(|c| {
                let c = c.to_lowercase();
                c.contains("skip") || c.contains("todo")
            })
            .unwrap_or(false)
    }
}

fn strip_duration(s: &str) -> &str {
    match DURATION_SUFFIX.find(s) {
        Some(m) => &s[..m.start()],
        None => s,
    }
}

fn strip_timestamp(line: &str) -> &str {
    match TIMESTAMP_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Parse one job log into failures and counts.
///
/// Returns `None` when the log holds no `ok` / `not ok` line at all, e.g. the
/// job died before its tests ran.
pub fn parse_test_failures(content: &str) -> Option<ParsedLog> {
    let mut parsed = ParsedLog::default();
    let mut current_file: Option<String> = None;
    let mut matched_lines = 0usize;

    for raw_line in content.lines() {
        let line = strip_timestamp(raw_line.trim_end_matches('\r'));

        if let Some(caps) = NOT_OK_LINE.captures(line) {
            matched_lines += 1;
            let tap = TapLine::parse(&caps[1], &caps[2]);

            parsed.stats.failed += 1;
            parsed.stats.total += 1;

            if tap.is_skip_or_todo() {
                parsed.stats.failed -= 1;
                parsed.stats.skipped += 1;
                continue;
            }

            parsed.failures.push(SubTestFailure {
                number: tap.number,
                name: tap.name,
                comment: tap.comment,
                file: current_file.clone(),
            });
            continue;
        }

        if let Some(caps) = OK_LINE.captures(line) {
            matched_lines += 1;
            let tap = TapLine::parse(&caps[1], &caps[2]);

            parsed.stats.total += 1;
            if tap.is_skip() {
                parsed.stats.skipped += 1;
            } else {
                parsed.stats.passed += 1;
            }
            continue;
        }

        if let Some(caps) = RUNNING_FILE.captures(line) {
            current_file = Some(caps[1].to_string());
        } else if let Some(caps) = FILE_LINE.captures(line) {
            current_file = Some(caps[1].to_string());
        }
    }

    if matched_lines == 0 {
        None
    } else {
        Some(parsed)
    }
}

/// Distinct source files referenced by failures, in first-seen order.
pub fn failure_files(failures: &[SubTestFailure]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for file in failures.iter().filter_map(|f| f.file.as_ref()) {
        if !files.contains(file) {
            files.push(file.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_skip_is_excluded_from_failures() {
        let log = "not ok 1 foo # SKIP\nnot ok 2 bar\nok 3 baz\n";
        let parsed = parse_test_failures(log).unwrap();

        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].number, 2);
        assert_eq!(parsed.failures[0].name, "bar");
        assert_eq!(
            parsed.stats,
            TestStats {
                total: 3,
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_todo_counts_as_skipped() {
        let parsed = parse_test_failures("not ok 1 pending feature # TODO later").unwrap();
        assert!(parsed.failures.is_empty());
        assert_eq!(parsed.stats.skipped, 1);
        assert_eq!(parsed.stats.failed, 0);
    }

    #[test]
    fn test_timestamp_prefix_and_trailers_are_stripped() {
        let log = "\
2026-10-19T02:11:04.1234567Z Running `k8s-confidential.bats`
2026-10-19T02:11:05.0000000Z ok 1 - pod starts in 1520ms
2026-10-19T02:11:09.0000000Z not ok 2 - attestation succeeds # timeout in 3000ms
2026-10-19T02:11:10.0000000Z not ok 3 image pull in 20ms
";
        let parsed = parse_test_failures(log).unwrap();

        assert_eq!(parsed.stats.total, 3);
        assert_eq!(parsed.stats.passed, 1);
        assert_eq!(parsed.failures.len(), 2);
        assert_eq!(parsed.failures[0].name, "attestation succeeds");
        assert_eq!(parsed.failures[0].comment.as_deref(), Some("timeout"));
        assert_eq!(
            parsed.failures[0].file.as_deref(),
            Some("k8s-confidential.bats")
        );
        assert_eq!(parsed.failures[1].name, "image pull");
        assert!(parsed.failures[1].comment.is_none());
    }

    #[test]
    fn test_standalone_filename_line_sets_context() {
        let log = "tests/integration/nydus.bats\nnot ok 1 mount works\nk8s-volume.bats\nnot ok 2 volume\n";
        let parsed = parse_test_failures(log).unwrap();

        assert_eq!(
            parsed.failures[0].file.as_deref(),
            Some("tests/integration/nydus.bats")
        );
        assert_eq!(parsed.failures[1].file.as_deref(), Some("k8s-volume.bats"));
        assert_eq!(
            failure_files(&parsed.failures),
            vec!["tests/integration/nydus.bats", "k8s-volume.bats"]
        );
    }

    #[test]
    fn test_no_tap_lines_returns_none() {
        assert!(parse_test_failures("").is_none());
        assert!(parse_test_failures("Error: runner provisioning failed\nexit 1\n").is_none());
    }

    #[test]
    fn test_ok_line_with_skip_directive() {
        let parsed = parse_test_failures("ok 1 # skip not on arm\nok 2 works").unwrap();
        assert_eq!(parsed.stats.skipped, 1);
        assert_eq!(parsed.stats.passed, 1);
        assert_eq!(parsed.stats.total, 2);
    }

    #[test]
    fn test_plan_line_is_ignored() {
        let parsed = parse_test_failures("1..2\nok 1 a\nnot ok 2 b").unwrap();
        assert_eq!(parsed.stats.total, 2);
        assert!(parsed.failures[0].file.is_none());
    }

    proptest! {
        #[test]
        fn prop_counts_match_line_shapes(
            outcomes in proptest::collection::vec(any::<bool>(), 0..40),
            word in "[a-z]{1,10}",
        ) {
            let log: String = outcomes
                .iter()
                .enumerate()
                .map(|(i, failed)| {
                    let prefix = if *failed { "not ok" } else { "ok" };
                    format!("{} {} {} case {}\n", prefix, i + 1, word, i)
                })
                .collect();

            let k = outcomes.iter().filter(|f| **f).count();
            let m = outcomes.len() - k;

            match parse_test_failures(&log) {
                None => prop_assert!(outcomes.is_empty()),
                Some(parsed) => {
                    prop_assert_eq!(parsed.failures.len(), k);
                    prop_assert_eq!(parsed.stats.total as usize, k + m);
                    prop_assert_eq!(parsed.stats.passed as usize, m);
                }
            }
        }
    }
}
