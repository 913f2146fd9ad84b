use serde::{Deserialize, Serialize};

/// One extracted test line from a lab report.
///
/// All five fields are required by the extraction schema. `heading` may come
/// back empty; grouping substitutes a fallback section for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabResultRow {
    pub heading: String,
    pub test_name: String,
    pub result: String,
    pub unit: String,
    pub biological_reference_interval: String,
}

impl LabResultRow {
    pub fn field(&self, field: LabField) -> &str {
        match field {
            LabField::Heading => &self.heading,
            LabField::TestName => &self.test_name,
            LabField::Result => &self.result,
            LabField::Unit => &self.unit,
            LabField::ReferenceInterval => &self.biological_reference_interval,
        }
    }

    pub fn set_field(&mut self, field: LabField, value: String) {
        let slot = match field {
            LabField::Heading => &mut self.heading,
            LabField::TestName => &mut self.test_name,
            LabField::Result => &mut self.result,
            LabField::Unit => &mut self.unit,
            LabField::ReferenceInterval => &mut self.biological_reference_interval,
        };
        *slot = value;
    }
}

/// Structured output of a successful extraction, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub results: Vec<LabResultRow>,
}

/// Addressable column of a [`LabResultRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabField {
    Heading,
    TestName,
    Result,
    Unit,
    #[serde(rename = "biological_reference_interval")]
    ReferenceInterval,
}

impl LabField {
    pub const ALL: [LabField; 5] = [
        LabField::Heading,
        LabField::TestName,
        LabField::Result,
        LabField::Unit,
        LabField::ReferenceInterval,
    ];

    /// Columns shown in a section table, left to right. The heading is the
    /// section title, not a column.
    pub const TABLE_COLUMNS: [LabField; 4] = [
        LabField::TestName,
        LabField::Result,
        LabField::Unit,
        LabField::ReferenceInterval,
    ];

    /// Wire name of the field in the extraction JSON.
    pub fn key(self) -> &'static str {
        match self {
            LabField::Heading => "heading",
            LabField::TestName => "test_name",
            LabField::Result => "result",
            LabField::Unit => "unit",
            LabField::ReferenceInterval => "biological_reference_interval",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LabField::Heading => "Section",
            LabField::TestName => "Test Name",
            LabField::Result => "Result",
            LabField::Unit => "Unit",
            LabField::ReferenceInterval => "Biological Reference Interval",
        }
    }
}

impl std::fmt::Display for LabField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> LabResultRow {
        LabResultRow {
            heading: "Lipid Profile".into(),
            test_name: "HDL".into(),
            result: "45".into(),
            unit: "mg/dL".into(),
            biological_reference_interval: "40-60".into(),
        }
    }

    #[test]
    fn deserializes_wire_row() {
        let json = r#"{"results":[{"heading":"Lipid Profile","test_name":"HDL","result":"45","unit":"mg/dL","biological_reference_interval":"40-60"}]}"#;
        let parsed: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results, vec![row()]);
    }

    #[test]
    fn row_missing_required_field_is_rejected() {
        let json = r#"{"results":[{"heading":"","test_name":"HDL","result":"45","unit":"mg/dL"}]}"#;
        assert!(serde_json::from_str::<ExtractionResult>(json).is_err());
    }

    #[test]
    fn missing_results_key_means_no_rows() {
        let parsed: ExtractionResult = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn set_field_touches_only_target() {
        let mut r = row();
        r.set_field(LabField::Unit, "mmol/L".into());
        assert_eq!(r.unit, "mmol/L");
        assert_eq!(r.result, "45");
        assert_eq!(r.field(LabField::Unit), "mmol/L");
    }

    #[test]
    fn serde_name_matches_key() {
        let json = serde_json::to_string(&LabField::ReferenceInterval).unwrap();
        assert_eq!(json, "\"biological_reference_interval\"");
    }
}
