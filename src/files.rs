//! Upload validation and metadata extraction for note attachments.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Settings;

/// Extracted text stored in metadata is capped at this many characters.
pub const EXTRACTED_TEXT_LIMIT: usize = 50_000;
/// Only the leading pages of a PDF are read for text.
pub const PDF_PAGE_LIMIT: usize = 10;
const DEFAULT_MIME: &str = "application/octet-stream";

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Filename is required")]
    MissingFilename,
    #[error("File type .{extension} not allowed. Allowed types: {allowed}")]
    TypeNotAllowed { extension: String, allowed: String },
    #[error("File too large. Maximum size is {max_mb}MB")]
    TooLarge { max_mb: u64 },
}

/// A validated upload ready to persist.
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    pub filename: String,
    pub original_filename: String,
    pub file_type: String,
    pub data: Vec<u8>,
    pub metadata: Value,
}

/// Lowercased text after the last `.`; the whole name when there is none.
pub fn extension(filename: &str) -> String {
    filename.rsplit('.').next().unwrap_or(filename).to_lowercase()
}

pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<String, FileError> {
    if filename.trim().is_empty() {
        return Err(FileError::MissingFilename);
    }
    let ext = extension(filename);
    if !allowed.iter().any(|a| *a == ext) {
        return Err(FileError::TypeNotAllowed {
            extension: ext,
            allowed: allowed.join(", "),
        });
    }
    Ok(ext)
}

/// `<yyyymmddHHMMSS>_<8 hex chars>.<ext>`, hashed over name, owner and timestamp.
pub fn unique_filename(original: &str, user_id: Uuid, now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%d%H%M%S").to_string();
    let digest = Sha256::digest(format!("{original}{user_id}{timestamp}").as_bytes());
    let short_hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{timestamp}_{short_hash}.{}", extension(original))
}

pub fn category_for(mime: &str) -> &'static str {
    if mime.starts_with("image/") {
        "image"
    } else if mime.starts_with("video/") {
        "video"
    } else if mime.starts_with("audio/") {
        "audio"
    } else if DOCUMENT_MIME_TYPES.contains(&mime) {
        "document"
    } else {
        "other"
    }
}

/// Text from plain-text bodies and the first pages of a PDF.
///
/// Other formats, and PDFs that fail to parse, yield `None`.
pub fn extract_text(data: &[u8], mime: &str) -> Option<String> {
    let text = match mime {
        "text/plain" => String::from_utf8_lossy(data).into_owned(),
        "application/pdf" => match pdf_text(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("PDF text extraction failed: {}", e);
                return None;
            }
        },
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(EXTRACTED_TEXT_LIMIT).collect())
}

fn pdf_text(data: &[u8]) -> Result<String, lopdf::Error> {
    let doc = lopdf::Document::load_mem(data)?;
    let pages: Vec<u32> = doc.get_pages().into_keys().take(PDF_PAGE_LIMIT).collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    doc.extract_text(&pages)
}

/// Width, height and format of an image, read from its header.
pub fn image_metadata(data: &[u8], mime: &str) -> Option<Value> {
    if !mime.starts_with("image/") {
        return None;
    }
    let size = imagesize::blob_size(data).ok()?;
    let format = imagesize::image_type(data).ok()?;
    Some(json!({
        "width": size.width,
        "height": size.height,
        "format": format!("{format:?}").to_uppercase(),
    }))
}

/// `Content-Disposition` for a download, with an ASCII `filename` and an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
pub fn attachment_disposition(original_filename: &str) -> String {
    let fallback: String = original_filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(original_filename)
    )
}

pub fn process_upload(
    original_filename: &str,
    content_type: Option<&str>,
    data: Vec<u8>,
    user_id: Uuid,
    settings: &Settings,
) -> Result<ProcessedUpload, FileError> {
    validate_extension(original_filename, &settings.allowed_file_types)?;

    if data.len() as u64 > settings.max_file_size_bytes() {
        return Err(FileError::TooLarge {
            max_mb: settings.max_file_size_mb,
        });
    }

    let file_type = content_type
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    let mut metadata = image_metadata(&data, &file_type).unwrap_or_else(|| json!({}));
    metadata["category"] = json!(category_for(&file_type));
    metadata["original_size"] = json!(data.len());
    if let Some(text) = extract_text(&data, &file_type) {
        metadata["extracted_text"] = Value::String(text);
    }

    Ok(ProcessedUpload {
        filename: unique_filename(original_filename, user_id, Utc::now()),
        original_filename: original_filename.to_string(),
        file_type,
        data,
        metadata,
    })
}
