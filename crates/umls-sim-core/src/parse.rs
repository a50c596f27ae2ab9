//! Parsers for the toolkit's line-oriented output.
//!
//! The grammar is isolated from process handling: every function here takes
//! captured text and returns typed records plus the lines it had to reject.
//!
//! ```text
//! similarity    0.5000<>hand (C0018563)<>skull (C0037303)
//!               0.5000<>C0018563(Hand)<>C0037303(Skull)
//! shortest path The shortest path (length: 3) between hand (C0018563) and skull (C0037303):
//!                 => C0018563 (Hand) => C1234567 (Body part) => C0037303 (Skull)
//!               There is not a path between C0018563 and C0037303 given the current view of the UMLS.
//! lcs           The least common subsumer between hand (C0018563) and skull (C0037303) is
//!               Body part (C1234567) with a min and max depth of 4 and 6
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::concept::Cui;

/// Field separator in similarity output and infiles.
pub const FIELD_DELIMITER: &str = "<>";

/// Separator between concepts on a shortest-path line.
pub const PATH_DELIMITER: &str = "=>";

static SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?$").expect("static score pattern")
});

static TERM_THEN_CUI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<term>.*?)\s*\((?P<cui>C\d{7})\)$").expect("static mention pattern")
});

static CUI_THEN_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<cui>C\d{7})\s*\((?P<term>.*)\)$").expect("static mention pattern")
});

static PATH_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<cui>C\d{7})\s*\((?P<term>[^()]*(?:\([^()]*\)[^()]*)*)\)")
        .expect("static path step pattern")
});

static PATH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^The shortest path \(length: (?P<length>\d+)\) between (?P<first>.+?\(C\d{7}\)) and (?P<second>.+?\(C\d{7}\)):\s*(?P<rest>.*)$",
    )
    .expect("static path pattern")
});

static NO_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^There is not a path between (?P<first>.+?) and (?P<second>.+?) given the current view of the UMLS\.?$",
    )
    .expect("static no-path pattern")
});

static LCS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^The least common subsumer between (?P<first>.+?\(C\d{7}\)) and (?P<second>.+?\(C\d{7}\)) is (?P<lcs>.+?\(C\d{7}\)) with a min and max depth of (?P<min>\d+) and (?P<max>\d+)\.?$",
    )
    .expect("static lcs pattern")
});

/// A numeric result exactly as the toolkit printed it.
///
/// Negative values (the toolkit prints `-1` when a relation is undefined)
/// are kept as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub text: String,
}

impl Score {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !SCORE.is_match(text) {
            return None;
        }
        let value = text.parse().ok()?;
        Some(Self {
            value,
            text: text.to_string(),
        })
    }

    /// The toolkit's "relation undefined" sentinel.
    pub fn is_undefined(&self) -> bool {
        self.value < 0.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A concept as echoed by the toolkit: `term (CUI)` or `CUI(term)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub term: Option<String>,
    pub cui: Cui,
}

impl Mention {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(cui) = Cui::parse(text) {
            return Some(Self { term: None, cui });
        }
        let caps = TERM_THEN_CUI
            .captures(text)
            .or_else(|| CUI_THEN_TERM.captures(text))?;
        let term = caps["term"].trim();
        Some(Self {
            term: (!term.is_empty()).then(|| term.to_string()),
            cui: Cui::parse(&caps["cui"])?,
        })
    }
}

/// One similarity line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub score: Score,
    pub first: Mention,
    pub second: Mention,
}

/// One shortest-path answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathRecord {
    Found {
        first: Mention,
        second: Mention,
        length: u32,
        steps: Vec<Mention>,
    },
    NotFound {
        first: String,
        second: String,
    },
}

/// One least-common-subsumer line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LcsRecord {
    pub first: Mention,
    pub second: Mention,
    pub subsumer: Mention,
    pub min_depth: u32,
    pub max_depth: u32,
}

/// A line that did not fit the expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    /// 1-based line number in the captured output.
    pub line_no: usize,
    pub text: String,
    pub reason: String,
}

impl std::fmt::Display for RejectedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} (`{}`)", self.line_no, self.reason, self.text)
    }
}

/// Records in output order plus the lines that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedLine>,
    /// Accepted records that still looked off.
    pub warnings: Vec<String>,
}

impl<T> Default for ParsedOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> ParsedOutput<T> {
    /// Nothing usable and at least one line rejected.
    pub fn is_unparseable(&self) -> bool {
        self.records.is_empty() && !self.rejected.is_empty()
    }

    fn reject(&mut self, line_no: usize, text: &str, reason: impl Into<String>) {
        self.rejected.push(RejectedLine {
            line_no,
            text: text.to_string(),
            reason: reason.into(),
        });
    }
}

/// Non-blank lines with their 1-based numbers.
fn lines(output: &str) -> impl Iterator<Item = (usize, &str)> {
    output
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// Parse `score<>first<>second` lines.
pub fn parse_similarity(output: &str) -> ParsedOutput<SimilarityRecord> {
    let mut parsed = ParsedOutput::default();

    for (line_no, line) in lines(output) {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != 3 {
            parsed.reject(
                line_no,
                line,
                format!("expected 3 `<>`-separated fields, found {}", fields.len()),
            );
            continue;
        }

        let Some(score) = Score::parse(fields[0]) else {
            parsed.reject(line_no, line, format!("score `{}` is not numeric", fields[0].trim()));
            continue;
        };
        let Some(first) = Mention::parse(fields[1]) else {
            parsed.reject(line_no, line, format!("no CUI in `{}`", fields[1].trim()));
            continue;
        };
        let Some(second) = Mention::parse(fields[2]) else {
            parsed.reject(line_no, line, format!("no CUI in `{}`", fields[2].trim()));
            continue;
        };

        parsed.records.push(SimilarityRecord {
            score,
            first,
            second,
        });
    }

    parsed
}

/// Pull every `CUI (term)` step out of a path line.
///
/// Steps are found wherever they sit, so a line whose `=>` separators are
/// missing still yields every concept. Anything between steps other than
/// whitespace and `=>` makes the line unreadable.
fn parse_steps(text: &str) -> Result<Vec<Mention>, String> {
    let mut steps = Vec::new();
    let mut last = 0;
    for caps in PATH_STEP.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = text[last..whole.start()].replace(PATH_DELIMITER, "");
        if !gap.trim().is_empty() {
            return Err(format!("unexpected `{}` between path steps", gap.trim()));
        }
        last = whole.end();

        let Some(cui) = Cui::parse(&caps["cui"]) else {
            return Err(format!("bad CUI `{}` in path", &caps["cui"]));
        };
        let term = caps["term"].trim();
        steps.push(Mention {
            term: (!term.is_empty()).then(|| term.to_string()),
            cui,
        });
    }

    let tail = text[last..].replace(PATH_DELIMITER, "");
    if !tail.trim().is_empty() {
        return Err(format!("unexpected `{}` after path steps", tail.trim()));
    }
    if steps.is_empty() {
        return Err("path step without a CUI".to_string());
    }
    Ok(steps)
}

impl ParsedOutput<PathRecord> {
    fn push_path(
        &mut self,
        line_no: usize,
        line: &str,
        (first, second, length): (Mention, Mention, u32),
        steps_text: &str,
    ) {
        let steps = match parse_steps(steps_text) {
            Ok(steps) => steps,
            Err(reason) => return self.reject(line_no, line, reason),
        };
        // The toolkit counts concepts, so a path of length n lists n steps.
        if steps.len() != length as usize {
            self.warnings.push(format!(
                "line {line_no}: path between {} and {} has length {length} but lists {} concepts",
                first.cui,
                second.cui,
                steps.len()
            ));
        }
        self.records.push(PathRecord::Found {
            first,
            second,
            length,
            steps,
        });
    }
}

/// Parse shortest-path blocks: a header followed by a `=>` path line, or a
/// single "There is not a path" line.
pub fn parse_shortest_path(output: &str) -> ParsedOutput<PathRecord> {
    let mut parsed = ParsedOutput::default();
    // Header waiting for its path line.
    let mut pending: Option<(usize, String, Mention, Mention, u32)> = None;

    for (line_no, line) in lines(output) {
        if line.starts_with(PATH_DELIMITER) {
            match pending.take() {
                Some((_, _, first, second, length)) => {
                    parsed.push_path(line_no, line, (first, second, length), line)
                }
                None => parsed.reject(line_no, line, "path line without a header"),
            }
            continue;
        }

        if let Some((header_no, header, ..)) = pending.take() {
            parsed.reject(header_no, &header, "header without a path line");
        }

        if let Some(caps) = PATH_HEADER.captures(line) {
            let (Some(first), Some(second)) =
                (Mention::parse(&caps["first"]), Mention::parse(&caps["second"]))
            else {
                parsed.reject(line_no, line, "unreadable concepts in header");
                continue;
            };
            let Ok(length) = caps["length"].parse::<u32>() else {
                parsed.reject(line_no, line, "path length out of range");
                continue;
            };

            let rest = caps["rest"].trim();
            if rest.is_empty() {
                pending = Some((line_no, line.to_string(), first, second, length));
            } else {
                parsed.push_path(line_no, line, (first, second, length), rest);
            }
            continue;
        }

        if let Some(caps) = NO_PATH.captures(line) {
            parsed.records.push(PathRecord::NotFound {
                first: caps["first"].trim().to_string(),
                second: caps["second"].trim().to_string(),
            });
            continue;
        }

        parsed.reject(line_no, line, "not a shortest-path line");
    }

    if let Some((header_no, header, ..)) = pending {
        parsed.reject(header_no, &header, "header without a path line");
    }

    parsed
}

/// Parse least-common-subsumer lines.
pub fn parse_lcs(output: &str) -> ParsedOutput<LcsRecord> {
    let mut parsed = ParsedOutput::default();

    for (line_no, line) in lines(output) {
        let Some(caps) = LCS.captures(line) else {
            parsed.reject(line_no, line, "not a least-common-subsumer line");
            continue;
        };

        let mentions = (
            Mention::parse(&caps["first"]),
            Mention::parse(&caps["second"]),
            Mention::parse(&caps["lcs"]),
        );
        let (Some(first), Some(second), Some(subsumer)) = mentions else {
            parsed.reject(line_no, line, "unreadable concepts");
            continue;
        };
        let (Ok(min_depth), Ok(max_depth)) =
            (caps["min"].parse::<u32>(), caps["max"].parse::<u32>())
        else {
            parsed.reject(line_no, line, "depth out of range");
            continue;
        };

        parsed.records.push(LcsRecord {
            first,
            second,
            subsumer,
            min_depth,
            max_depth,
        });
    }

    parsed
}
