//! Input normalisation.
//!
//! Each side of a pair is classified before anything is spawned:
//! a canonical CUI passes through, anything that looks like an identifier
//! but is not canonical is rejected, and everything else is free text for
//! the toolkit to resolve.

use std::sync::LazyLock;

use regex::Regex;

use crate::concept::{ConceptPair, ConceptRef, Cui};
use crate::error::{Error, Result};

/// Identifier-shaped: an optional single letter followed only by digits,
/// at least four of them. Short codes such as `B12` stay free text.
static IDENTIFIER_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]?\d{4,}$").expect("static identifier pattern"));

/// Classify one raw input.
///
/// `index` is the pair position, used only in the error.
pub fn classify(index: usize, raw: &str) -> Result<ConceptRef> {
    let value = raw.trim();

    if value.is_empty() {
        return Err(Error::InvalidCuiPair {
            index,
            value: raw.to_string(),
            reason: "is empty".to_string(),
        });
    }

    if let Some(cui) = Cui::parse(value) {
        return Ok(ConceptRef::Cui(cui));
    }

    if IDENTIFIER_SHAPE.is_match(value) {
        return Err(Error::InvalidCuiPair {
            index,
            value: value.to_string(),
            reason: identifier_problem(value).to_string(),
        });
    }

    Ok(ConceptRef::Term(value.to_string()))
}

fn identifier_problem(value: &str) -> &'static str {
    let first = value.chars().next().unwrap_or_default();
    if first.is_ascii_digit() {
        "is missing the `C` prefix"
    } else if first == 'c' {
        "must use an upper-case `C` prefix"
    } else if first != 'C' {
        "has the wrong prefix (expected `C`)"
    } else {
        "must be `C` followed by exactly seven digits"
    }
}

/// Validate every pair, failing on the first malformed identifier.
pub fn normalize_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Result<Vec<ConceptPair>> {
    pairs
        .iter()
        .enumerate()
        .map(|(index, (first, second))| {
            Ok(ConceptPair::new(
                classify(index, first.as_ref())?,
                classify(index, second.as_ref())?,
            ))
        })
        .collect()
}

/// Split a `left<>right` line (the toolkit infile format). Falls back to
/// the first comma when no `<>` is present.
pub fn split_pair_line(line: &str) -> Option<(String, String)> {
    let (left, right) = line
        .split_once("<>")
        .or_else(|| line.split_once(','))?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left.to_string(), right.to_string()))
}
