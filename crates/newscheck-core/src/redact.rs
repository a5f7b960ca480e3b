//! Secret scrubbing for anything that leaves the process as text.
//!
//! Search providers take their key as a query parameter, so transport errors
//! quoting the request URL would otherwise leak it into logs and explanations.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const REDACTED: &str = "[REDACTED]";

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/%]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "secret",
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9\-_]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

/// Scrub known secret shapes and report which patterns fired.
pub fn redact_with_report(input: &str) -> (String, BTreeSet<&'static str>) {
    let mut fired = BTreeSet::new();
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}{REDACTED}", &caps[1])
                } else {
                    REDACTED.to_string()
                }
            })
            .to_string();
        if matched {
            fired.insert(*name);
        }
    }
    (output, fired)
}

/// Scrub known secret shapes from `input`.
pub fn redact_secrets(input: &str) -> String {
    redact_with_report(input).0
}
