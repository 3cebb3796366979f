//! Word (`.docx`) text extraction.

use std::path::Path;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::{DocumentFormat, LoaderError, Segment, SegmentExtractor, extraction_error};

/// Flattens the document body into one segment: paragraphs on separate lines, table cells in
/// reading order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl SegmentExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::WordDocument
    }

    fn extract(&self, path: &Path) -> Result<Vec<Segment>, LoaderError> {
        let bytes = std::fs::read(path)?;
        let docx = docx_rs::read_docx(&bytes)
            .map_err(|error| extraction_error(DocumentFormat::WordDocument, error))?;

        let mut lines = Vec::new();
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(paragraph) => lines.push(paragraph_text(paragraph)),
                DocumentChild::Table(table) => collect_table(table, &mut lines),
                _ => {}
            }
        }

        Ok(vec![Segment {
            position: 0,
            text: lines.join("\n"),
        }])
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_paragraph_children(&paragraph.children, &mut text);
    text
}

fn push_paragraph_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(text) => out.push_str(&text.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_paragraph_children(&link.children, out),
            _ => {}
        }
    }
}

fn collect_table(table: &Table, lines: &mut Vec<String>) {
    for TableChild::TableRow(row) in &table.rows {
        for TableRowChild::TableCell(cell) in &row.cells {
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => lines.push(paragraph_text(paragraph)),
                    TableCellContent::Table(nested) => collect_table(nested, lines),
                    _ => {}
                }
            }
        }
    }
}
