//! PDF text extraction, one segment per page.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use super::{DocumentFormat, LoaderError, Segment, SegmentExtractor, extraction_error};

/// Extracts page text with `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl SegmentExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, path: &Path) -> Result<Vec<Segment>, LoaderError> {
        let document =
            Document::load(path).map_err(|error| extraction_error(DocumentFormat::Pdf, error))?;

        let segments = document
            .get_pages()
            .keys()
            .enumerate()
            .map(|(position, &page_number)| {
                let text = match document.extract_text(&[page_number]) {
                    Ok(text) => text,
                    Err(error) => {
                        // Pages with undecodable fonts keep their slot so positions stay aligned.
                        debug!(page = page_number, %error, "Failed to decode page text");
                        String::new()
                    }
                };
                Segment { position, text }
            })
            .collect();

        Ok(segments)
    }
}
