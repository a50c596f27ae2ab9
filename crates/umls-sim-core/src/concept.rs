//! Concept identifiers and the pairs they travel in.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use regex::Regex;

/// `C` followed by seven digits.
static CUI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^C\d{7}$").expect("static CUI pattern"));

/// A Concept Unique Identifier, always in canonical `C0000000` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cui(String);

impl Cui {
    /// Accepts only the canonical form; see [`crate::normalize`] for the
    /// distinction between malformed identifiers and free text.
    pub fn parse(value: &str) -> Option<Self> {
        CUI_PATTERN.is_match(value).then(|| Cui(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a pair: an identifier, or a term the toolkit will look up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptRef {
    Cui(Cui),
    Term(String),
}

impl ConceptRef {
    /// Text handed to the toolkit.
    pub fn as_input(&self) -> &str {
        match self {
            ConceptRef::Cui(cui) => cui.as_str(),
            ConceptRef::Term(term) => term,
        }
    }

    pub fn cui(&self) -> Option<&Cui> {
        match self {
            ConceptRef::Cui(cui) => Some(cui),
            ConceptRef::Term(_) => None,
        }
    }

    pub fn term(&self) -> Option<&str> {
        match self {
            ConceptRef::Cui(_) => None,
            ConceptRef::Term(term) => Some(term),
        }
    }

    pub fn is_cui(&self) -> bool {
        matches!(self, ConceptRef::Cui(_))
    }
}

impl std::fmt::Display for ConceptRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_input())
    }
}

/// An ordered pair of concepts. Order decides row order, not the score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptPair {
    pub first: ConceptRef,
    pub second: ConceptRef,
}

impl ConceptPair {
    pub fn new(first: ConceptRef, second: ConceptRef) -> Self {
        Self { first, second }
    }

    /// Both sides are identifiers.
    pub fn is_cui_pair(&self) -> bool {
        self.first.is_cui() && self.second.is_cui()
    }

    /// Owned `(left, right)` strings for the toolkit infile.
    pub fn to_input(&self) -> (String, String) {
        (
            self.first.as_input().to_string(),
            self.second.as_input().to_string(),
        )
    }
}

impl std::fmt::Display for ConceptPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<>{}", self.first, self.second)
    }
}
