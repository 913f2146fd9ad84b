//! Provider-neutral description of the structured output we ask models for.
//!
//! Transports translate a [`SchemaNode`] into their own wire format; see
//! `inference::gemini::to_gemini_schema`.

use crate::pipeline::types::LabField;

/// A node in a response schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    String,
    Array(Box<SchemaNode>),
    Object(Vec<SchemaField>),
}

/// A named property of an object node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub node: SchemaNode,
    pub required: bool,
}

impl SchemaField {
    pub fn required(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            required: false,
        }
    }
}

impl SchemaNode {
    /// Names of required properties, in declaration order. Empty for
    /// non-object nodes.
    pub fn required_fields(&self) -> Vec<&str> {
        match self {
            SchemaNode::Object(fields) => fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// `{ results: [{heading, test_name, result, unit, biological_reference_interval}] }`
/// with every row property required. `results` itself is optional.
pub fn lab_report_schema() -> SchemaNode {
    let row = SchemaNode::Object(
        LabField::ALL
            .into_iter()
            .map(|f| SchemaField::required(f.key(), SchemaNode::String))
            .collect(),
    );
    SchemaNode::Object(vec![SchemaField::optional(
        "results",
        SchemaNode::Array(Box::new(row)),
    )])
}
