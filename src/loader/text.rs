//! Plain text extraction.

use std::path::Path;

use super::{DocumentFormat, LoaderError, Segment, SegmentExtractor, extraction_error};

/// Reads the whole file as a single UTF-8 segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl SegmentExtractor for TextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    fn extract(&self, path: &Path) -> Result<Vec<Segment>, LoaderError> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|error| extraction_error(DocumentFormat::PlainText, error))?;
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
        Ok(vec![Segment { position: 0, text }])
    }
}
