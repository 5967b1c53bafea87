//! Event and property name validation
//!
//! Every event name and every top-level property key must satisfy the
//! same rule: 1-255 bytes, matching the identifier pattern, and not one
//! of the reserved keywords the ingestion side claims for itself. A
//! violation rejects the whole record; nothing is partially written.

use beacon_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

const NAME_PATTERN: &str = r"^[a-zA-Z_$][a-zA-Z0-9_$]{0,99}$";
const KEYWORD_PATTERN: &str = "^(distinct_id|original_id|time|properties|id|first_id|second_id|\
                               users|events|event|user_id|date|datetime)$";

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(NAME_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("name pattern must compile")
});

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(KEYWORD_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("keyword pattern must compile")
});

/// Check an event name or property key against the naming rules
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 255 {
        return Err(Error::InvalidParameter(format!(
            "name must be 1-255 bytes: {:?}",
            name
        )));
    }
    if KEYWORD_RE.is_match(name) {
        return Err(Error::InvalidParameter(format!(
            "name is a reserved keyword: {:?}",
            name
        )));
    }
    if !NAME_RE.is_match(name) {
        return Err(Error::InvalidParameter(format!(
            "name does not match [a-zA-Z_$][a-zA-Z0-9_$]{{0,99}}: {:?}",
            name
        )));
    }
    Ok(())
}

/// Check a distinct/original id: 1-255 bytes, no charset restriction
pub fn check_id(label: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 255 {
        return Err(Error::InvalidParameter(format!(
            "{} must be 1-255 bytes: {:?}",
            label, id
        )));
    }
    Ok(())
}
