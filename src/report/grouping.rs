//! Heading-grouped view of extracted rows, with copy-on-write edits.
//!
//! A [`GroupedResults`] is an immutable value. [`GroupedResults::apply_edit`]
//! returns a new value; sections that were not touched share their row
//! storage with the original.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::pipeline::types::{LabField, LabResultRow};

/// Section used for rows whose heading is blank.
pub const MISC_HEADING: &str = "Miscellaneous Tests";

/// One heading and its rows in extraction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    heading: String,
    rows: Arc<Vec<LabResultRow>>,
}

impl ReportSection {
    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn rows(&self) -> &[LabResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True if both sections point at the same row storage.
    pub fn shares_rows_with(&self, other: &ReportSection) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }
}

/// Summary counters shown above the result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_entries: usize,
    pub total_sections: usize,
}

/// Sections in first-seen heading order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupedResults {
    sections: Vec<ReportSection>,
}

/// Group rows by heading. Pure and total; rows are cloned, never modified.
pub fn group_by_heading(rows: &[LabResultRow]) -> GroupedResults {
    let mut sections: Vec<(String, Vec<LabResultRow>)> = Vec::new();

    for row in rows {
        let heading = section_heading(&row.heading);
        match sections.iter().position(|(h, _)| h == heading) {
            Some(i) => sections[i].1.push(row.clone()),
            None => sections.push((heading.to_string(), vec![row.clone()])),
        }
    }

    GroupedResults {
        sections: sections
            .into_iter()
            .map(|(heading, rows)| ReportSection {
                heading,
                rows: Arc::new(rows),
            })
            .collect(),
    }
}

fn section_heading(heading: &str) -> &str {
    if heading.trim().is_empty() {
        MISC_HEADING
    } else {
        heading
    }
}

impl GroupedResults {
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.heading.as_str())
    }

    pub fn get(&self, heading: &str) -> Option<&[LabResultRow]> {
        self.section(heading).map(ReportSection::rows)
    }

    fn section(&self, heading: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.heading == heading)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.sections.iter().map(ReportSection::len).sum()
    }

    pub fn total_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total_entries: self.total_entries(),
            total_sections: self.total_sections(),
        }
    }

    /// Replace one field of one row.
    ///
    /// An unknown heading or out-of-range index is a no-op: the returned value
    /// equals `self`. Edit targets can go stale between render and commit, so
    /// this never fails.
    pub fn apply_edit(
        &self,
        heading: &str,
        index: usize,
        field: LabField,
        value: impl Into<String>,
    ) -> GroupedResults {
        let Some(pos) = self.sections.iter().position(|s| s.heading == heading) else {
            return self.clone();
        };
        if index >= self.sections[pos].rows.len() {
            return self.clone();
        }

        let mut next = self.clone();
        let rows = Arc::make_mut(&mut next.sections[pos].rows);
        rows[index].set_field(field, value.into());
        next
    }
}

impl Serialize for GroupedResults {
    /// Serialized as a JSON object keyed by heading, in section order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.heading, section.rows.as_slice())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(heading: &str, test: &str, result: &str) -> LabResultRow {
        LabResultRow {
            heading: heading.into(),
            test_name: test.into(),
            result: result.into(),
            unit: "mg/dL".into(),
            biological_reference_interval: "0-100".into(),
        }
    }

    fn sample() -> Vec<LabResultRow> {
        vec![
            row("Lipid Profile", "HDL", "45"),
            row("CBC", "Hemoglobin", "13.5"),
            row("", "Vitamin D", "30"),
            row("Lipid Profile", "LDL", "120"),
            row("   ", "B12", "400"),
            row("CBC", "WBC", "7000"),
        ]
    }

    fn multiset(rows: impl IntoIterator<Item = LabResultRow>) -> HashMap<LabResultRow, usize> {
        let mut counts = HashMap::new();
        for r in rows {
            *counts.entry(r).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn empty_input_gives_empty_grouping() {
        let grouped = group_by_heading(&[]);
        assert!(grouped.is_empty());
        assert_eq!(grouped.total_entries(), 0);
        assert_eq!(grouped.total_sections(), 0);
    }

    #[test]
    fn groups_in_first_seen_order() {
        let grouped = group_by_heading(&sample());
        let headings: Vec<&str> = grouped.headings().collect();
        assert_eq!(headings, vec!["Lipid Profile", "CBC", MISC_HEADING]);
    }

    #[test]
    fn keeps_extraction_order_within_group() {
        let grouped = group_by_heading(&sample());
        let lipids: Vec<&str> = grouped
            .get("Lipid Profile")
            .unwrap()
            .iter()
            .map(|r| r.test_name.as_str())
            .collect();
        assert_eq!(lipids, vec!["HDL", "LDL"]);
    }

    #[test]
    fn blank_headings_go_to_misc() {
        let grouped = group_by_heading(&sample());
        let misc: Vec<&str> = grouped
            .get(MISC_HEADING)
            .unwrap()
            .iter()
            .map(|r| r.test_name.as_str())
            .collect();
        assert_eq!(misc, vec!["Vitamin D", "B12"]);
        // Rows keep their original (blank) heading.
        assert_eq!(grouped.get(MISC_HEADING).unwrap()[1].heading, "   ");
    }

    #[test]
    fn grouping_preserves_row_multiset() {
        let mut input = sample();
        input.push(row("CBC", "WBC", "7000"));
        let grouped = group_by_heading(&input);

        let output = grouped
            .sections()
            .iter()
            .flat_map(|s| s.rows().iter().cloned());
        assert_eq!(multiset(output), multiset(input.clone()));
        assert_eq!(grouped.total_entries(), input.len());
    }

    #[test]
    fn grouping_is_idempotent_and_pure() {
        let input = sample();
        let before = input.clone();
        let first = group_by_heading(&input);
        let second = group_by_heading(&input);
        assert_eq!(first, second);
        assert_eq!(input, before);
    }

    #[test]
    fn summary_counts() {
        let grouped = group_by_heading(&sample());
        assert_eq!(
            grouped.summary(),
            ReportSummary {
                total_entries: 6,
                total_sections: 3
            }
        );
    }

    #[test]
    fn single_lipid_row() {
        let hdl = LabResultRow {
            heading: "Lipid Profile".into(),
            test_name: "HDL".into(),
            result: "45".into(),
            unit: "mg/dL".into(),
            biological_reference_interval: "40-60".into(),
        };
        let grouped = group_by_heading(std::slice::from_ref(&hdl));
        assert_eq!(grouped.get("Lipid Profile"), Some(std::slice::from_ref(&hdl)));
        assert_eq!(grouped.total_entries(), 1);
        assert_eq!(grouped.total_sections(), 1);
    }

    #[test]
    fn edit_unknown_heading_is_noop() {
        let grouped = group_by_heading(&sample());
        let edited = grouped.apply_edit("Thyroid", 0, LabField::Result, "9");
        assert_eq!(edited, grouped);
    }

    #[test]
    fn edit_out_of_range_is_noop() {
        let grouped = group_by_heading(&sample());
        let edited = grouped.apply_edit("CBC", 2, LabField::Result, "9");
        assert_eq!(edited, grouped);
    }

    #[test]
    fn edit_changes_exactly_one_field() {
        let grouped = group_by_heading(&sample());
        let edited = grouped.apply_edit("CBC", 1, LabField::Result, "6500");

        let before = &grouped.get("CBC").unwrap()[1];
        let after = &edited.get("CBC").unwrap()[1];
        assert_eq!(after.result, "6500");
        for field in LabField::ALL {
            if field != LabField::Result {
                assert_eq!(after.field(field), before.field(field));
            }
        }
        assert_eq!(edited.get("CBC").unwrap()[0], grouped.get("CBC").unwrap()[0]);
        assert_eq!(edited.get("Lipid Profile"), grouped.get("Lipid Profile"));
        assert_eq!(edited.total_entries(), grouped.total_entries());
    }

    #[test]
    fn edit_leaves_original_untouched_and_shares_other_sections() {
        let grouped = group_by_heading(&sample());
        let edited = grouped.apply_edit("Lipid Profile", 0, LabField::Unit, "mmol/L");

        assert_eq!(grouped.get("Lipid Profile").unwrap()[0].unit, "mg/dL");
        assert_eq!(edited.get("Lipid Profile").unwrap()[0].unit, "mmol/L");

        let (old, new) = (grouped.sections(), edited.sections());
        assert!(!old[0].shares_rows_with(&new[0]));
        assert!(old[1].shares_rows_with(&new[1]));
        assert!(old[2].shares_rows_with(&new[2]));
    }

    #[test]
    fn editing_heading_field_does_not_regroup() {
        let grouped = group_by_heading(&sample());
        let edited = grouped.apply_edit("CBC", 0, LabField::Heading, "Hematology");
        assert_eq!(edited.get("CBC").unwrap()[0].heading, "Hematology");
        assert_eq!(edited.total_sections(), grouped.total_sections());
    }

    #[test]
    fn serializes_as_heading_keyed_object() {
        let grouped = group_by_heading(&[row("CBC", "WBC", "7000"), row("", "B12", "400")]);
        let json = serde_json::to_value(&grouped).unwrap();
        assert_eq!(json["CBC"][0]["test_name"], "WBC");
        assert_eq!(json[MISC_HEADING][0]["result"], "400");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}
