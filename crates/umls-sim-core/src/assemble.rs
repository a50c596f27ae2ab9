//! Result assembly: matching parsed records back onto the input pairs.
//!
//! The toolkit answers an infile in input order but skips pairs it cannot
//! resolve, may emit several lines for a term that maps to more than one
//! concept, and may print lines that echo no input pair at all (a second
//! subsumer, a remapped CUI). Records are therefore walked with a cursor:
//! each input pair, in order, looks ahead for the first record that echoes
//! it and takes the consecutive records that do. Records passed over on the
//! way are reported as notes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::concept::{ConceptPair, ConceptRef};
use crate::error::{Error, Result};
use crate::measure::Measure;
use crate::parse::{LcsRecord, Mention, PathRecord, RejectedLine, SimilarityRecord};
use crate::table::{
    MeasureScore, MergeKey, PathOutcome, ResultRow, ResultTable, SkippedPair, Subsumer,
};

/// What to do when a term resolves to more than one concept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    /// Use the first concept the toolkit returned and log a warning.
    #[default]
    PickFirst,
    /// Fail the operation with [`Error::AmbiguousTerm`].
    Error,
}

/// Records that echo a pair of concepts.
pub trait Echo {
    fn echoed(&self) -> (&Mention, &Mention);
}

impl Echo for SimilarityRecord {
    fn echoed(&self) -> (&Mention, &Mention) {
        (&self.first, &self.second)
    }
}

impl Echo for LcsRecord {
    fn echoed(&self) -> (&Mention, &Mention) {
        (&self.first, &self.second)
    }
}

fn side_matches(concept: &ConceptRef, mention: &Mention) -> bool {
    match concept {
        ConceptRef::Cui(cui) => &mention.cui == cui,
        ConceptRef::Term(term) => mention
            .term
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(term.trim())),
    }
}

fn echoes<T: Echo>(pair: &ConceptPair, record: &T) -> bool {
    let (first, second) = record.echoed();
    side_matches(&pair.first, first) && side_matches(&pair.second, second)
}

fn same_concepts<T: Echo>(a: &T, b: &T) -> bool {
    let (a1, a2) = a.echoed();
    let (b1, b2) = b.echoed();
    a1.cui == b1.cui && a2.cui == b2.cui
}

/// Records matched to pair positions.
#[derive(Debug)]
pub struct Aligned<T> {
    /// One slot per input pair.
    pub slots: Vec<Option<T>>,
    /// Pairs with no record, with the reason.
    pub missing: Vec<(usize, String)>,
    /// Ambiguity picks and unmatched output.
    pub notes: Vec<String>,
}

/// Position of the first record in `records` that echoes `pairs[index]`.
///
/// Records that echo no remaining pair are passed over. The search stops at
/// a record that answers a later pair, so a pair the toolkit skipped never
/// swallows its neighbours' answers.
fn find_answer<T: Echo>(
    pairs: &[ConceptPair],
    index: usize,
    records: &VecDeque<T>,
) -> Option<usize> {
    let later = &pairs[index + 1..];
    for (pos, record) in records.iter().enumerate() {
        if echoes(&pairs[index], record) {
            return Some(pos);
        }
        if later.iter().any(|p| echoes(p, record)) {
            return None;
        }
    }
    None
}

/// Note for a record that no pair took.
fn stray_note<T: Echo>(pairs: &[ConceptPair], before: usize, record: &T) -> String {
    let (f, s) = record.echoed();
    match pairs[..before].iter().rposition(|p| echoes(p, record)) {
        Some(owner) => format!("pair #{owner}: extra answer for {}<>{} ignored", f.cui, s.cui),
        None => format!("unmatched output for {}<>{}", f.cui, s.cui),
    }
}

/// Walk `records` against `pairs` in order.
pub fn align<T: Echo>(
    pairs: &[ConceptPair],
    records: Vec<T>,
    policy: AmbiguityPolicy,
) -> Result<Aligned<T>> {
    let mut records: VecDeque<T> = records.into();
    let mut aligned = Aligned {
        slots: Vec::with_capacity(pairs.len()),
        missing: Vec::new(),
        notes: Vec::new(),
    };

    for (index, pair) in pairs.iter().enumerate() {
        let mut group: Vec<T> = Vec::new();
        if let Some(pos) = find_answer(pairs, index, &records) {
            for stray in records.drain(..pos) {
                let note = stray_note(pairs, index, &stray);
                debug!(index, note = %note, "passing over toolkit output");
                aligned.notes.push(note);
            }
            while let Some(next) = records.front() {
                let accept = echoes(pair, next)
                    // A CUI pair has exactly one answer.
                    && !(pair.is_cui_pair() && !group.is_empty())
                    // A repeat of a seen answer belongs to the next (duplicate) pair.
                    && !group.iter().any(|g| same_concepts(g, next));
                if !accept {
                    break;
                }
                if let Some(record) = records.pop_front() {
                    group.push(record);
                }
            }
        }

        if group.len() > 1 {
            let (a1, _) = group[0].echoed();
            let (b1, _) = group[1].echoed();
            let term = if a1.cui != b1.cui {
                pair.first.as_input()
            } else {
                pair.second.as_input()
            };
            let candidates: Vec<String> = group
                .iter()
                .map(|r| {
                    let (f, s) = r.echoed();
                    format!("{}<>{}", f.cui, s.cui)
                })
                .collect();

            match policy {
                AmbiguityPolicy::Error => {
                    return Err(Error::AmbiguousTerm {
                        index,
                        term: term.to_string(),
                        candidates,
                    })
                }
                AmbiguityPolicy::PickFirst => {
                    warn!(index, term, count = group.len(), "ambiguous term, using first concept");
                    aligned.notes.push(format!(
                        "pair #{index}: `{term}` resolved to {} concepts ({}); using the first",
                        group.len(),
                        candidates.join(", ")
                    ));
                }
            }
        }

        match group.into_iter().next() {
            Some(record) => aligned.slots.push(Some(record)),
            None => {
                aligned.slots.push(None);
                aligned
                    .missing
                    .push((index, "no result returned by the toolkit".to_string()));
            }
        }
    }

    for leftover in records {
        aligned.notes.push(stray_note(pairs, pairs.len(), &leftover));
    }

    Ok(aligned)
}

/// Join key implied by how the pairs were given.
pub fn merge_key(pairs: &[ConceptPair]) -> MergeKey {
    if pairs.iter().all(ConceptPair::is_cui_pair) {
        MergeKey::Cuis
    } else {
        MergeKey::Terms
    }
}

/// A row carrying only what the input itself says.
fn input_row(index: usize, pair: &ConceptPair) -> ResultRow {
    let mut row = ResultRow::new(index);
    row.term1 = pair.first.term().map(str::to_string);
    row.term2 = pair.second.term().map(str::to_string);
    row.cui1 = pair.first.cui().cloned();
    row.cui2 = pair.second.cui().cloned();
    row
}

fn skipped(index: usize, pair: &ConceptPair, reason: String) -> SkippedPair {
    SkippedPair {
        index,
        first: pair.first.to_string(),
        second: pair.second.to_string(),
        reason,
    }
}

fn rejected_notes(label: &str, rejected: &[RejectedLine]) -> Vec<String> {
    rejected
        .iter()
        .map(|r| format!("{label}: skipped {r}"))
        .collect()
}

/// One measure's worth of aligned similarity output.
pub struct MeasureOutput {
    pub measure: Measure,
    pub aligned: Aligned<SimilarityRecord>,
    pub rejected: Vec<RejectedLine>,
}

/// Join per-measure outputs on pair position into one table.
///
/// A pair gets a row when at least one measure answered it; measures that
/// did not leave an empty cell.
pub fn similarity_table(pairs: &[ConceptPair], outputs: Vec<MeasureOutput>) -> ResultTable {
    let mut table = ResultTable::new(merge_key(pairs));
    table.measures = outputs.iter().map(|o| o.measure).collect();

    let mut rows: Vec<Option<ResultRow>> = vec![None; pairs.len()];
    let mut reasons: Vec<Vec<String>> = vec![Vec::new(); pairs.len()];

    for output in outputs {
        let label = format!("similarity ({})", output.measure);
        table.warnings.extend(rejected_notes(&label, &output.rejected));
        table
            .warnings
            .extend(output.aligned.notes.iter().map(|n| format!("{label}: {n}")));
        for (index, reason) in output.aligned.missing {
            reasons[index].push(format!("{}: {}", output.measure, reason));
        }

        for (index, slot) in output.aligned.slots.into_iter().enumerate() {
            let row = rows[index].get_or_insert_with(|| input_row(index, &pairs[index]));
            if let Some(record) = &slot {
                if row.scores.iter().all(|s| s.score.is_none()) {
                    row.set_identity(&record.first, &record.second);
                }
            }
            row.scores.push(MeasureScore {
                measure: output.measure,
                score: slot.map(|r| r.score),
            });
        }
    }

    for (index, row) in rows.into_iter().enumerate() {
        match row {
            Some(row) if row.scores.iter().any(|s| s.score.is_some()) => table.rows.push(row),
            _ => table
                .skipped
                .push(skipped(index, &pairs[index], reasons[index].join("; "))),
        }
    }

    table
}

/// Build the least-common-subsumer table.
pub fn lcs_table(
    pairs: &[ConceptPair],
    aligned: Aligned<LcsRecord>,
    rejected: &[RejectedLine],
) -> ResultTable {
    let mut table = ResultTable::new(merge_key(pairs));
    table.includes_lcs = true;
    table.warnings.extend(rejected_notes("lcs", rejected));
    table
        .warnings
        .extend(aligned.notes.iter().map(|n| format!("lcs: {n}")));

    let mut missing = aligned.missing.into_iter();
    for (index, slot) in aligned.slots.into_iter().enumerate() {
        match slot {
            Some(record) => {
                let mut row = input_row(index, &pairs[index]);
                row.set_identity(&record.first, &record.second);
                row.lcs = Some(Subsumer {
                    term: record.subsumer.term,
                    cui: record.subsumer.cui,
                    min_depth: record.min_depth,
                    max_depth: record.max_depth,
                });
                table.rows.push(row);
            }
            None => {
                let reason = missing
                    .find(|(i, _)| *i == index)
                    .map(|(_, r)| r)
                    .unwrap_or_else(|| "no result returned by the toolkit".to_string());
                table.skipped.push(skipped(index, &pairs[index], reason));
            }
        }
    }

    table
}

/// Outcome of one shortest-path invocation.
pub enum PathSlot {
    Record(PathRecord),
    Missing(String),
}

/// Build the shortest-path table from one outcome per pair.
pub fn path_table(
    pairs: &[ConceptPair],
    slots: Vec<PathSlot>,
    warnings: Vec<String>,
) -> ResultTable {
    let mut table = ResultTable::new(merge_key(pairs));
    table.includes_path = true;
    table.warnings = warnings;

    for (index, slot) in slots.into_iter().enumerate() {
        let pair = &pairs[index];
        match slot {
            PathSlot::Record(PathRecord::Found {
                first,
                second,
                length,
                steps,
            }) => {
                let mut row = input_row(index, pair);
                row.set_identity(&first, &second);
                row.path = Some(PathOutcome::Found { length, steps });
                table.rows.push(row);
            }
            PathSlot::Record(PathRecord::NotFound { .. }) => {
                let mut row = input_row(index, pair);
                row.path = Some(match (pair.first.cui(), pair.second.cui()) {
                    // A concept is trivially connected to itself.
                    (Some(a), Some(b)) if a == b => PathOutcome::Found {
                        length: 0,
                        steps: vec![Mention {
                            term: None,
                            cui: a.clone(),
                        }],
                    },
                    _ => PathOutcome::NoPath,
                });
                table.rows.push(row);
            }
            PathSlot::Missing(reason) => table.skipped.push(skipped(index, pair, reason)),
        }
    }

    table
}
