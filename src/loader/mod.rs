//! Document loading: format dispatch and per-format text extraction.
//!
//! Uploaded bytes are staged in a temporary file whose suffix matches the detected format, then
//! handed to the extractor for that format. Extraction yields ordered [`Segment`]s: one per page
//! for PDFs, one for the whole file otherwise.

mod docx;
mod images;
mod pdf;
mod text;

use std::{fmt, io::Write, path::Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use docx::DocxExtractor;
pub use images::{EncodedImage, ExtractedImage, extract_pdf_images};
pub use pdf::PdfExtractor;
pub use text::TextExtractor;

/// Errors raised while detecting a format or extracting its text.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The filename extension is not one of the supported formats.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    /// Staging the upload on disk failed.
    #[error("Failed to stage document: {0}")]
    Io(#[from] std::io::Error),
    /// The extraction library rejected the file.
    #[error("Failed to extract {format} content: {message}")]
    Extraction {
        /// Format that was being extracted.
        format: DocumentFormat,
        /// Library error message.
        message: String,
    },
}

/// Closed set of formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 plain text.
    PlainText,
    /// Office Open XML word processing document.
    WordDocument,
}

impl DocumentFormat {
    /// Extensions accepted for upload, without the leading dot.
    pub const SUPPORTED_EXTENSIONS: [&'static str; 3] = ["pdf", "txt", "docx"];

    /// Detect the format from an optional filename.
    ///
    /// No filename, or a filename without an extension, means PDF. Anything else is matched on the
    /// lowercased extension.
    pub fn from_filename(filename: Option<&str>) -> Result<Self, LoaderError> {
        let Some(name) = filename.map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(Self::Pdf);
        };
        let Some(extension) = Path::new(name).extension().and_then(|ext| ext.to_str()) else {
            return Ok(Self::Pdf);
        };
        Self::from_extension(extension)
    }

    /// Match a bare extension such as `pdf` or `DOCX`.
    pub fn from_extension(extension: &str) -> Result<Self, LoaderError> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::PlainText),
            "docx" => Ok(Self::WordDocument),
            other => Err(LoaderError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    /// File suffix used when staging the upload.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::PlainText => ".txt",
            Self::WordDocument => ".docx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "PDF",
            Self::PlainText => "plain text",
            Self::WordDocument => "Word document",
        };
        f.write_str(label)
    }
}

/// One unit of extracted text: a PDF page or a whole text/Word file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the source document.
    pub position: usize,
    /// Extracted text.
    pub text: String,
}

/// A document after format detection and text extraction.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// SHA-256 hex digest of the uploaded bytes.
    pub document_id: String,
    /// Detected format.
    pub format: DocumentFormat,
    /// Original filename, if one was supplied.
    pub filename: Option<String>,
    /// Extracted segments in source order.
    pub segments: Vec<Segment>,
}

impl LoadedDocument {
    /// Segment texts joined with newlines.
    pub fn raw_text(&self) -> String {
        join_segments(&self.segments)
    }
}

/// Join segment texts in order with a single newline.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-format text extraction from a staged file.
pub trait SegmentExtractor: Send + Sync {
    /// Format handled by this extractor.
    fn format(&self) -> DocumentFormat;

    /// Extract ordered segments from the file at `path`.
    fn extract(&self, path: &Path) -> Result<Vec<Segment>, LoaderError>;
}

/// Select the extractor for a format.
pub fn extractor_for(format: DocumentFormat) -> Box<dyn SegmentExtractor> {
    match format {
        DocumentFormat::Pdf => Box::new(PdfExtractor),
        DocumentFormat::PlainText => Box::new(TextExtractor),
        DocumentFormat::WordDocument => Box::new(DocxExtractor),
    }
}

/// Detect the format, stage the bytes in a temporary file, and extract its segments.
///
/// Unsupported extensions fail before anything touches the filesystem. The staged file is removed
/// when extraction finishes.
pub fn load_document(bytes: &[u8], filename: Option<&str>) -> Result<LoadedDocument, LoaderError> {
    let format = DocumentFormat::from_filename(filename)?;

    let mut staged = tempfile::Builder::new()
        .prefix("docusmart-")
        .suffix(format.suffix())
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;

    let segments = extractor_for(format).extract(staged.path())?;
    tracing::debug!(
        %format,
        filename = ?filename,
        bytes = bytes.len(),
        segments = segments.len(),
        "Extracted document segments"
    );

    Ok(LoadedDocument {
        document_id: document_id_for(bytes),
        format,
        filename: filename.map(str::to_string),
        segments,
    })
}

/// Content-derived identifier: SHA-256 hex digest of the raw bytes.
pub fn document_id_for(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn extraction_error(format: DocumentFormat, error: impl fmt::Display) -> LoaderError {
    LoaderError::Extraction {
        format,
        message: error.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for small in-memory documents used across loader tests.

    use lopdf::{
        Document, Object, Stream, dictionary,
        content::{Content, Operation},
    };

    /// Build a PDF with one page per entry, each page showing its text with a Courier font.
    pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }

    /// Build a `.docx` archive with one paragraph per entry.
    pub(crate) fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = docx_rs::Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*text)),
            );
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).expect("pack docx");
        cursor.into_inner()
    }
}
