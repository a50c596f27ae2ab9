//! Tabular results.
//!
//! A [`ResultTable`] holds one [`ResultRow`] per input pair that produced
//! a result. Which columns it has depends on what was asked for: one per
//! measure for similarity, `Length`/`Path` for shortest path, and the four
//! LCS columns for least common subsumer. Tables from different operations
//! over the same pairs can be merged into one.

use serde::{Deserialize, Serialize};

use crate::concept::Cui;
use crate::measure::Measure;
use crate::parse::{Mention, Score};

/// Score for one measure in one row. `None` when that measure returned
/// nothing for the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureScore {
    pub measure: Measure,
    pub score: Option<Score>,
}

/// Shortest-path column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathOutcome {
    Found { length: u32, steps: Vec<Mention> },
    NoPath,
}

impl PathOutcome {
    pub fn length(&self) -> Option<u32> {
        match self {
            PathOutcome::Found { length, .. } => Some(*length),
            PathOutcome::NoPath => None,
        }
    }

    /// CUIs along the path, in order.
    pub fn cuis(&self) -> Vec<&Cui> {
        match self {
            PathOutcome::Found { steps, .. } => steps.iter().map(|s| &s.cui).collect(),
            PathOutcome::NoPath => Vec::new(),
        }
    }

    /// `C1 (a) => C2 (b)` form used in rendered tables.
    pub fn render_path(&self) -> String {
        match self {
            PathOutcome::Found { steps, .. } => steps
                .iter()
                .map(|s| match &s.term {
                    Some(term) => format!("{} ({})", s.cui, term),
                    None => s.cui.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" => "),
            PathOutcome::NoPath => "No path found".to_string(),
        }
    }
}

/// Least-common-subsumer column values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsumer {
    pub term: Option<String>,
    pub cui: Cui,
    pub min_depth: u32,
    pub max_depth: u32,
}

/// One output row, keyed by the position of its input pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Position of the input pair.
    pub index: usize,
    pub term1: Option<String>,
    pub term2: Option<String>,
    pub cui1: Option<Cui>,
    pub cui2: Option<Cui>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<MeasureScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcs: Option<Subsumer>,
}

impl ResultRow {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            term1: None,
            term2: None,
            cui1: None,
            cui2: None,
            scores: Vec::new(),
            path: None,
            lcs: None,
        }
    }

    /// Score for a measure, if present.
    pub fn score(&self, measure: Measure) -> Option<&Score> {
        self.scores
            .iter()
            .find(|s| s.measure == measure)
            .and_then(|s| s.score.as_ref())
    }

    /// Key used when joining rows from different tables.
    pub fn key(&self, key: MergeKey) -> Option<(String, String)> {
        match key {
            MergeKey::Cuis => Some((
                self.cui1.as_ref()?.to_string(),
                self.cui2.as_ref()?.to_string(),
            )),
            MergeKey::Terms => Some((
                self.term1.as_ref()?.to_lowercase(),
                self.term2.as_ref()?.to_lowercase(),
            )),
        }
    }

    /// Fill identity fields from the first two mentions of a record.
    pub(crate) fn set_identity(&mut self, first: &Mention, second: &Mention) {
        self.cui1 = Some(first.cui.clone());
        self.cui2 = Some(second.cui.clone());
        self.term1 = first.term.clone().or_else(|| self.term1.take());
        self.term2 = second.term.clone().or_else(|| self.term2.take());
    }

    fn absorb(&mut self, other: ResultRow) {
        if self.term1.is_none() {
            self.term1 = other.term1;
        }
        if self.term2.is_none() {
            self.term2 = other.term2;
        }
        if self.cui1.is_none() {
            self.cui1 = other.cui1;
        }
        if self.cui2.is_none() {
            self.cui2 = other.cui2;
        }
        for score in other.scores {
            if !self.scores.iter().any(|s| s.measure == score.measure) {
                self.scores.push(score);
            }
        }
        if self.path.is_none() {
            self.path = other.path;
        }
        if self.lcs.is_none() {
            self.lcs = other.lcs;
        }
    }
}

/// An input pair that produced no row, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub index: usize,
    pub first: String,
    pub second: String,
    pub reason: String,
}

/// Which identity columns rows are joined on when merging tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKey {
    Cuis,
    Terms,
}

/// Ordered result rows plus what could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    /// Measure columns, in request order.
    pub measures: Vec<Measure>,
    pub includes_path: bool,
    pub includes_lcs: bool,
    /// Join key matching how the input pairs were given.
    pub key: MergeKey,
    pub rows: Vec<ResultRow>,
    pub skipped: Vec<SkippedPair>,
    /// Output lines that were skipped while parsing.
    pub warnings: Vec<String>,
}

impl ResultTable {
    pub fn new(key: MergeKey) -> Self {
        Self {
            measures: Vec::new(),
            includes_path: false,
            includes_lcs: false,
            key,
            rows: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column headers for the current shape.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = ["Term 1", "Term 2", "CUI 1", "CUI 2"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        columns.extend(self.measures.iter().map(|m| m.name().to_string()));
        if self.includes_path {
            columns.push("Length".to_string());
            columns.push("Path".to_string());
        }
        if self.includes_lcs {
            columns.extend(
                ["LCS Term", "LCS CUI", "Min Depth", "Max Depth"]
                    .iter()
                    .map(|c| c.to_string()),
            );
        }
        columns
    }

    /// Cell text for one row, aligned with [`ResultTable::columns`].
    pub fn cells(&self, row: &ResultRow) -> Vec<String> {
        fn text<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let mut cells = vec![
            text(row.term1.as_deref()),
            text(row.term2.as_deref()),
            text(row.cui1.as_ref()),
            text(row.cui2.as_ref()),
        ];
        for measure in &self.measures {
            cells.push(text(row.score(*measure)));
        }
        if self.includes_path {
            match &row.path {
                Some(PathOutcome::NoPath) => {
                    cells.push("No path found".to_string());
                    cells.push("No path found".to_string());
                }
                Some(path) => {
                    cells.push(text(path.length()));
                    cells.push(path.render_path());
                }
                None => cells.extend([String::new(), String::new()]),
            }
        }
        if self.includes_lcs {
            match &row.lcs {
                Some(lcs) => cells.extend([
                    text(lcs.term.as_deref()),
                    lcs.cui.to_string(),
                    lcs.min_depth.to_string(),
                    lcs.max_depth.to_string(),
                ]),
                None => cells.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        cells
    }

    /// Tab-separated rendering with a header line.
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns().join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&self.cells(row).join("\t"));
            out.push('\n');
        }
        out
    }

    /// Outer-join another table into this one on `key`.
    ///
    /// Rows whose key matches gain the other row's columns; rows without a
    /// match (or without a key) are appended.
    pub fn merge(&mut self, other: ResultTable, key: MergeKey) {
        for measure in &other.measures {
            if !self.measures.contains(measure) {
                self.measures.push(*measure);
            }
        }
        self.includes_path |= other.includes_path;
        self.includes_lcs |= other.includes_lcs;
        if other.key == MergeKey::Terms {
            self.key = MergeKey::Terms;
        }

        for row in other.rows {
            let existing = row
                .key(key)
                .and_then(|k| self.rows.iter_mut().find(|r| r.key(key).as_ref() == Some(&k)));
            match existing {
                Some(target) => target.absorb(row),
                None => self.rows.push(row),
            }
        }

        self.skipped.extend(other.skipped);
        self.warnings.extend(other.warnings);
    }
}

impl std::fmt::Display for ResultTable {
    /// Column-aligned plain text.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self.columns();
        let rows: Vec<Vec<String>> = self.rows.iter().map(|r| self.cells(r)).collect();

        let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
        for cells in &rows {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        writeln!(f, "{}", line(&columns))?;
        for cells in &rows {
            writeln!(f, "{}", line(cells))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cui(s: &str) -> Cui {
        Cui::parse(s).unwrap()
    }

    fn row(index: usize, c1: &str, c2: &str) -> ResultRow {
        let mut row = ResultRow::new(index);
        row.cui1 = Some(cui(c1));
        row.cui2 = Some(cui(c2));
        row
    }

    #[test]
    fn test_similarity_columns_and_cells() {
        let mut table = ResultTable::new(MergeKey::Cuis);
        table.measures = vec![Measure::Lch, Measure::Wup];
        let mut r = row(0, "C0018563", "C0037303");
        r.term1 = Some("hand".to_string());
        r.term2 = Some("skull".to_string());
        r.scores = vec![
            MeasureScore {
                measure: Measure::Lch,
                score: Score::parse("0.500"),
            },
            MeasureScore {
                measure: Measure::Wup,
                score: None,
            },
        ];
        table.rows.push(r);

        assert_eq!(
            table.columns(),
            ["Term 1", "Term 2", "CUI 1", "CUI 2", "lch", "wup"]
        );
        assert_eq!(
            table.to_tsv(),
            "Term 1\tTerm 2\tCUI 1\tCUI 2\tlch\twup\nhand\tskull\tC0018563\tC0037303\t0.500\t\n"
        );
    }

    #[test]
    fn test_no_path_cells() {
        let mut table = ResultTable::new(MergeKey::Cuis);
        table.includes_path = true;
        let mut r = row(0, "C0018563", "C0037303");
        r.path = Some(PathOutcome::NoPath);
        table.rows.push(r);

        let cells = table.cells(&table.rows[0]);
        assert_eq!(&cells[4..], ["No path found", "No path found"]);
    }

    #[test]
    fn test_merge_joins_on_cuis() {
        let mut sim = ResultTable::new(MergeKey::Cuis);
        sim.measures = vec![Measure::Lch];
        let mut a = row(0, "C0018563", "C0037303");
        a.scores.push(MeasureScore {
            measure: Measure::Lch,
            score: Score::parse("1.2040"),
        });
        sim.rows.push(a);

        let mut lcs = ResultTable::new(MergeKey::Cuis);
        lcs.includes_lcs = true;
        let mut b = row(0, "C0018563", "C0037303");
        b.term1 = Some("Hand".to_string());
        b.lcs = Some(Subsumer {
            term: Some("Body part".to_string()),
            cui: cui("C1234567"),
            min_depth: 4,
            max_depth: 6,
        });
        lcs.rows.push(b);
        lcs.rows.push(row(1, "C0000001", "C0000002"));

        sim.merge(lcs, MergeKey::Cuis);

        assert_eq!(sim.len(), 2);
        assert!(sim.includes_lcs);
        let merged = &sim.rows[0];
        assert_eq!(merged.term1.as_deref(), Some("Hand"));
        assert_eq!(merged.score(Measure::Lch).unwrap().text, "1.2040");
        assert_eq!(merged.lcs.as_ref().unwrap().cui, cui("C1234567"));
    }

    #[test]
    fn test_display_aligns_columns() {
        let mut table = ResultTable::new(MergeKey::Cuis);
        table.rows.push(row(0, "C0018563", "C0037303"));
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Term 1  Term 2  CUI 1"));
        assert!(lines[1].contains("C0018563  C0037303"));
    }
}
