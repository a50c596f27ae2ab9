//! The catalog of relatedness measures the toolkit understands.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// A relatedness measure, named as the toolkit's `--measure` flag expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Path,
    Upath,
    Lch,
    Wup,
    Zhong,
    Cdist,
    Nam,
    Res,
    Lin,
    Jcn,
    Vector,
    Pks,
    Faith,
    Cmatch,
    Batet,
    Sanchez,
}

impl Measure {
    pub const ALL: [Measure; 16] = [
        Measure::Path,
        Measure::Upath,
        Measure::Lch,
        Measure::Wup,
        Measure::Zhong,
        Measure::Cdist,
        Measure::Nam,
        Measure::Res,
        Measure::Lin,
        Measure::Jcn,
        Measure::Vector,
        Measure::Pks,
        Measure::Faith,
        Measure::Cmatch,
        Measure::Batet,
        Measure::Sanchez,
    ];

    /// Used when a caller asks for no measure at all.
    pub const DEFAULT: Measure = Measure::Lch;

    pub fn name(&self) -> &'static str {
        match self {
            Measure::Path => "path",
            Measure::Upath => "upath",
            Measure::Lch => "lch",
            Measure::Wup => "wup",
            Measure::Zhong => "zhong",
            Measure::Cdist => "cdist",
            Measure::Nam => "nam",
            Measure::Res => "res",
            Measure::Lin => "lin",
            Measure::Jcn => "jcn",
            Measure::Vector => "vector",
            Measure::Pks => "pks",
            Measure::Faith => "faith",
            Measure::Cmatch => "cmatch",
            Measure::Batet => "batet",
            Measure::Sanchez => "sanchez",
        }
    }

    /// Parse a list of names, rejecting the first unknown one.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Measure>, Error> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }

    /// Drop repeats (first occurrence wins); an empty request means `lch`.
    pub fn dedup_or_default(measures: &[Measure]) -> Vec<Measure> {
        let mut unique: Vec<Measure> = Vec::with_capacity(measures.len());
        for m in measures {
            if !unique.contains(m) {
                unique.push(*m);
            }
        }
        if unique.is_empty() {
            unique.push(Measure::DEFAULT);
        }
        unique
    }
}

impl FromStr for Measure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Measure::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::UnknownMeasure(s.to_string()))
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
