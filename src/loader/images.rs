//! Embedded image extraction from PDF pages.

use std::io::{Cursor, Read};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, xobject::PdfImage};
use serde::Serialize;
use tracing::debug;

use super::{DocumentFormat, LoaderError, extraction_error};

/// An image XObject recovered from a PDF page.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedImage {
    /// One-based page number the image is drawn on.
    pub page: u32,
    /// Zero-based index among the images kept for that page.
    pub index: usize,
    /// MIME type of `data`.
    pub mime_type: String,
    /// Width in pixels as declared by the PDF.
    pub width: u32,
    /// Height in pixels as declared by the PDF.
    pub height: u32,
    /// Encoded image bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ExtractedImage {
    /// File extension matching `mime_type`.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/jp2" => "jp2",
            _ => "png",
        }
    }

    /// Suggested filename, unique within one document.
    pub fn file_name(&self) -> String {
        format!("page{}_image{}.{}", self.page, self.index, self.extension())
    }
}

/// Transport form of an [`ExtractedImage`] with its bytes base64-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedImage {
    /// One-based page number.
    pub page: u32,
    /// Zero-based index within the page.
    pub index: usize,
    /// MIME type of the decoded data.
    pub mime_type: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Standard base64 encoding of the image bytes.
    pub data_base64: String,
}

impl From<ExtractedImage> for EncodedImage {
    fn from(image: ExtractedImage) -> Self {
        Self {
            data_base64: STANDARD.encode(&image.data),
            page: image.page,
            index: image.index,
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
        }
    }
}

const MAX_IMAGES: usize = 100;
const MAX_TOTAL_BYTES: usize = 50 * 1024 * 1024;
/// Icons and rules below this size are not worth returning.
const MIN_DIMENSION: i64 = 50;

/// Walk every page in order and collect its embedded images.
///
/// JPEG and JPEG 2000 streams are returned as stored, after peeling any outer Flate layers.
/// Flate-compressed or unfiltered raster data is re-encoded as PNG. Images that cannot be decoded
/// are skipped with a debug log. At most `MAX_IMAGES` images and `MAX_TOTAL_BYTES` of image data
/// are returned.
pub fn extract_pdf_images(bytes: &[u8]) -> Result<Vec<ExtractedImage>, LoaderError> {
    let document =
        Document::load_mem(bytes).map_err(|error| extraction_error(DocumentFormat::Pdf, error))?;

    let mut images = Vec::new();
    let mut total_bytes = 0usize;
    'pages: for (page_number, page_id) in document.get_pages() {
        let page_images = match document.get_page_images(page_id) {
            Ok(page_images) => page_images,
            Err(error) => {
                debug!(page = page_number, %error, "Failed to list page images");
                continue;
            }
        };

        let mut index = 0;
        for pdf_image in page_images {
            if images.len() >= MAX_IMAGES || total_bytes >= MAX_TOTAL_BYTES {
                debug!(count = images.len(), total_bytes, "Image extraction limit reached");
                break 'pages;
            }
            if pdf_image.width < MIN_DIMENSION || pdf_image.height < MIN_DIMENSION {
                debug!(
                    id = ?pdf_image.id,
                    width = pdf_image.width,
                    height = pdf_image.height,
                    "Skipping small image"
                );
                continue;
            }

            let budget = MAX_TOTAL_BYTES - total_bytes;
            let (data, mime_type) = match decode_image(&document, &pdf_image, budget) {
                Ok(decoded) => decoded,
                Err(reason) => {
                    debug!(id = ?pdf_image.id, %reason, "Skipping undecodable image");
                    continue;
                }
            };
            total_bytes += data.len();
            images.push(ExtractedImage {
                page: page_number,
                index,
                mime_type: mime_type.to_string(),
                width: u32::try_from(pdf_image.width).unwrap_or_default(),
                height: u32::try_from(pdf_image.height).unwrap_or_default(),
                data,
            });
            index += 1;
        }
    }

    debug!(count = images.len(), total_bytes, "Extracted PDF images");
    Ok(images)
}

fn decode_image(
    document: &Document,
    pdf_image: &PdfImage,
    budget: usize,
) -> Result<(Vec<u8>, &'static str), String> {
    let filters = pdf_image.filters.as_deref().unwrap_or_default();
    let flate_layers = filters
        .iter()
        .take_while(|filter| *filter == "FlateDecode")
        .count();

    match &filters[flate_layers..] {
        [] => {
            raster_to_png(document, pdf_image, flate_layers, budget).map(|png| (png, "image/png"))
        }
        [codec] if codec == "DCTDecode" => {
            peel_flate(pdf_image.content, flate_layers, budget).map(|data| (data, "image/jpeg"))
        }
        [codec] if codec == "JPXDecode" => {
            peel_flate(pdf_image.content, flate_layers, budget).map(|data| (data, "image/jp2"))
        }
        _ => Err(format!("unsupported filter chain {filters:?}")),
    }
}

/// Inflate at most `limit` bytes; anything past the limit is never produced.
fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>, String> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(data)
        .take(limit as u64)
        .read_to_end(&mut inflated)
        .map_err(|error| format!("inflate failed: {error}"))?;
    Ok(inflated)
}

fn peel_flate(content: &[u8], layers: usize, budget: usize) -> Result<Vec<u8>, String> {
    let mut data = content.to_vec();
    for _ in 0..layers {
        data = inflate(&data, budget.saturating_add(1))?;
    }
    if data.len() > budget {
        return Err(format!("image exceeds the remaining {budget} byte budget"));
    }
    Ok(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

fn raster_to_png(
    document: &Document,
    pdf_image: &PdfImage,
    flate_layers: usize,
    budget: usize,
) -> Result<Vec<u8>, String> {
    let width = u32::try_from(pdf_image.width).map_err(|_| "negative width".to_string())?;
    let height = u32::try_from(pdf_image.height).map_err(|_| "negative height".to_string())?;
    let image_mask = pdf_image
        .origin_dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);
    let model = if image_mask {
        ColorModel::Gray
    } else {
        color_model(document, pdf_image.origin_dict)?
    };
    let bits = match pdf_image.bits_per_component.unwrap_or(if image_mask { 1 } else { 8 }) {
        bits @ (1 | 2 | 4 | 8 | 16) => bits as usize,
        other => return Err(format!("unsupported BitsPerComponent {other}")),
    };

    let row_count = height as usize;
    let samples_per_row = (width as usize)
        .checked_mul(model.channels())
        .ok_or("image row is too wide")?;
    let row_bytes = samples_per_row
        .checked_mul(bits)
        .map(|row_bits| row_bits.div_ceil(8))
        .ok_or("image row is too wide")?;
    let params = decode_params(document, pdf_image.origin_dict);
    let predictor = Predictor::from_params(params, row_bytes)?;
    let expected = (row_bytes + predictor.row_overhead())
        .checked_mul(row_count)
        .filter(|len| *len <= budget)
        .ok_or("image exceeds the remaining byte budget")?;
    if samples_per_row.saturating_mul(row_count) > budget {
        return Err("decoded image exceeds the remaining byte budget".into());
    }

    let mut data = pdf_image.content.to_vec();
    for layer in 1..=flate_layers {
        let limit = if layer == flate_layers {
            expected
        } else {
            budget
        };
        data = inflate(&data, limit)?;
    }
    if data.len() < expected {
        return Err(format!(
            "expected {expected} bytes of samples, found {}",
            data.len()
        ));
    }
    // Streams may carry padding after the last row.
    data.truncate(expected);

    let rows = predictor.unfilter(data, row_bytes)?;
    let samples = unpack_samples(rows, row_bytes, samples_per_row, bits);
    let decoded = match model {
        ColorModel::Gray => {
            GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
        }
        ColorModel::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorModel::Cmyk => {
            RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8)
        }
    };
    let decoded = decoded.ok_or_else(|| "pixel data does not match dimensions".to_string())?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|error| format!("png encoding failed: {error}"))?;
    Ok(png)
}

fn color_model(document: &Document, dict: &Dictionary) -> Result<ColorModel, String> {
    let space = dict
        .get(b"ColorSpace")
        .map_err(|_| "image has no colour space".to_string())?;
    let (_, space) = document
        .dereference(space)
        .map_err(|error| format!("colour space lookup failed: {error}"))?;

    match space {
        Object::Name(name) => named_color_model(name),
        Object::Array(parts) => match parts.first().and_then(|family| family.as_name().ok()) {
            Some(b"ICCBased") => {
                let components = parts
                    .get(1)
                    .and_then(|profile| document.dereference(profile).ok())
                    .and_then(|(_, profile)| profile.as_stream().ok())
                    .and_then(|profile| profile.dict.get(b"N").and_then(Object::as_i64).ok());
                match components {
                    Some(1) => Ok(ColorModel::Gray),
                    Some(3) => Ok(ColorModel::Rgb),
                    Some(4) => Ok(ColorModel::Cmyk),
                    other => Err(format!("ICC profile with {other:?} components")),
                }
            }
            Some(b"Indexed" | b"I") => Err("indexed colour spaces are not decoded".into()),
            Some(family) => named_color_model(family),
            None => Err("empty colour space array".into()),
        },
        other => Err(format!("unexpected colour space object {other:?}")),
    }
}

fn named_color_model(name: &[u8]) -> Result<ColorModel, String> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorModel::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorModel::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
        other => Err(format!(
            "unsupported colour space {}",
            String::from_utf8_lossy(other)
        )),
    }
}

/// Parameters of the innermost Flate filter, where a predictor lives.
fn decode_params<'a>(document: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    let params = dict.get(b"DecodeParms").ok()?;
    let (_, params) = document.dereference(params).ok()?;
    match params {
        Object::Dictionary(params) => Some(params),
        Object::Array(entries) => entries
            .last()
            .and_then(|entry| document.dereference(entry).ok())
            .and_then(|(_, entry)| entry.as_dict().ok()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predictor {
    None,
    Tiff { bytes_per_pixel: usize },
    Png { bytes_per_pixel: usize },
}

impl Predictor {
    fn from_params(params: Option<&Dictionary>, row_bytes: usize) -> Result<Self, String> {
        let Some(params) = params else {
            return Ok(Self::None);
        };
        let int = |key: &[u8], default: i64| {
            params
                .get(key)
                .and_then(Object::as_i64)
                .unwrap_or(default)
        };
        let kind = int(b"Predictor", 1);
        if kind <= 1 {
            return Ok(Self::None);
        }

        let [colors, bits, columns] = [
            int(b"Colors", 1),
            int(b"BitsPerComponent", 8),
            int(b"Columns", 1),
        ]
        .map(|value| usize::try_from(value).unwrap_or_default());
        let pixel_bits = colors * bits;
        if pixel_bits == 0 || (pixel_bits * columns).div_ceil(8) != row_bytes {
            return Err("predictor row layout does not match the image".into());
        }
        let bytes_per_pixel = pixel_bits.div_ceil(8);

        match kind {
            2 if bits == 8 => Ok(Self::Tiff { bytes_per_pixel }),
            2 => Err(format!("TIFF predictor with {bits} bit samples")),
            10..=15 => Ok(Self::Png { bytes_per_pixel }),
            other => Err(format!("unknown predictor {other}")),
        }
    }

    /// Bytes each encoded row carries ahead of its samples.
    fn row_overhead(self) -> usize {
        usize::from(matches!(self, Self::Png { .. }))
    }

    fn unfilter(self, mut data: Vec<u8>, row_bytes: usize) -> Result<Vec<u8>, String> {
        match self {
            Self::None => Ok(data),
            Self::Tiff { bytes_per_pixel } => {
                for row in data.chunks_exact_mut(row_bytes) {
                    for i in bytes_per_pixel..row.len() {
                        row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
                    }
                }
                Ok(data)
            }
            Self::Png { bytes_per_pixel } => unfilter_png_rows(&data, row_bytes, bytes_per_pixel),
        }
    }
}

fn unfilter_png_rows(data: &[u8], row_bytes: usize, bpp: usize) -> Result<Vec<u8>, String> {
    let mut samples = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_bytes];
    for encoded in data.chunks_exact(row_bytes + 1) {
        let mut row = encoded[1..].to_vec();
        for i in 0..row_bytes {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let delta = match encoded[0] {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(format!("unknown PNG row filter {other}")),
            };
            row[i] = row[i].wrapping_add(delta);
        }
        samples.extend_from_slice(&row);
        previous = row;
    }
    Ok(samples)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let distance = |value: u8| (estimate - i16::from(value)).abs();
    if distance(left) <= distance(up) && distance(left) <= distance(up_left) {
        left
    } else if distance(up) <= distance(up_left) {
        up
    } else {
        up_left
    }
}

/// Widen packed samples to one byte each; 16 bit samples keep their high byte.
fn unpack_samples(
    rows: Vec<u8>,
    row_bytes: usize,
    samples_per_row: usize,
    bits: usize,
) -> Vec<u8> {
    match bits {
        8 => rows,
        16 => rows.chunks_exact(2).map(|pair| pair[0]).collect(),
        _ => {
            let max = (1u16 << bits) - 1;
            let mut samples = Vec::with_capacity(samples_per_row * rows.len() / row_bytes.max(1));
            for row in rows.chunks_exact(row_bytes) {
                for sample in 0..samples_per_row {
                    let bit = sample * bits;
                    let shift = 8 - bits - bit % 8;
                    let value = (u16::from(row[bit / 8]) >> shift) & max;
                    samples.push((value * 255 / max) as u8);
                }
            }
            samples
        }
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for pixel in cmyk.chunks_exact(4) {
        let black = 1.0 - f32::from(pixel[3]) / 255.0;
        for &ink in &pixel[..3] {
            let channel = 255.0 * (1.0 - f32::from(ink) / 255.0) * black;
            rgb.push(channel.round().clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}
