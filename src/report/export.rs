//! Printable A4 rendering of a grouped report via `printpdf`.

use std::io::BufWriter;

use printpdf::*;
use thiserror::Error;

use super::grouping::GroupedResults;
use crate::pipeline::types::LabField;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const LEFT: f32 = 20.0;
const INDENT: f32 = 25.0;
const WRAP_AT: usize = 90;

pub const REPORT_TITLE: &str = "Lab Report Summary";

pub const PRINT_FOOTER: &str =
    "Values are editable and should be verified against the original document.";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),
}

/// Write cursor that starts a new page when the bottom margin is reached.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl<'a> Cursor<'a> {
    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, advance: f32) {
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
            self.pages += 1;
        }
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.y -= advance;
    }

    fn skip(&mut self, mm: f32) {
        self.y -= mm;
    }
}

/// Render the grouped results as PDF bytes.
pub fn render_pdf(report: &GroupedResults) -> Result<Vec<u8>, ExportError> {
    let (doc, page1, layer1) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Font(e.to_string()))?;

    let pages = {
        let mut cursor = Cursor {
            doc: &doc,
            layer: doc.get_page(page1).get_layer(layer1),
            y: TOP,
            pages: 1,
        };

        cursor.line(REPORT_TITLE, 14.0, LEFT, &bold, 7.0);
        let summary = report.summary();
        cursor.line(
            &format!(
                "Total Entries: {}    Sections Found: {}",
                summary.total_entries, summary.total_sections
            ),
            9.0,
            LEFT,
            &font,
            4.5,
        );
        cursor.skip(6.0);

        let header = LabField::TABLE_COLUMNS
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(" | ");

        for section in report.sections() {
            cursor.line(
                &format!(
                    "{} - Total Tests: {}",
                    section.heading().to_uppercase(),
                    section.len()
                ),
                11.0,
                LEFT,
                &bold,
                5.5,
            );
            cursor.line(&header, 8.0, INDENT, &bold, 4.5);
            for row in section.rows() {
                for line in wrap_text(&row_line(row), WRAP_AT) {
                    cursor.line(&line, 9.0, INDENT, &font, 4.5);
                }
            }
            cursor.skip(5.0);
        }

        cursor.skip(4.0);
        cursor.line(PRINT_FOOTER, 8.0, LEFT, &font, 4.5);
        cursor.pages
    };

    tracing::debug!(
        pages,
        sections = report.total_sections(),
        entries = report.total_entries(),
        "Rendered report PDF"
    );

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| ExportError::Save(e.to_string()))
}

fn row_line(row: &crate::pipeline::types::LabResultRow) -> String {
    LabField::TABLE_COLUMNS
        .iter()
        .map(|f| {
            let value = row.field(*f).trim();
            if value.is_empty() {
                "-"
            } else {
                value
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Greedy word wrap at `width` characters.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
