//! Upload admission: extension allow-list cross-checked against the
//! content type sniffed from the bytes themselves.

use crate::error::CoreError;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "md", "txt"];
const TEXT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Bytes inspected by the text heuristic.
const SNIFF_LEN: usize = 512;

const MIME_PDF: &str = "application/pdf";
const MIME_TEXT: &str = "text/plain";
const MIME_UNKNOWN: &str = "application/octet-stream";

/// A file that passed validation, ready to be staged or generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    /// `application/pdf` or `text/plain`.
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn is_pdf(&self) -> bool {
        self.content_type == MIME_PDF
    }
}

/// Detect the content type from magic bytes, falling back to a
/// binary-vs-text heuristic.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }
    if looks_like_text(data) {
        MIME_TEXT
    } else {
        MIME_UNKNOWN
    }
}

fn looks_like_text(data: &[u8]) -> bool {
    let head = &data[..data.len().min(SNIFF_LEN)];
    !head.iter().any(|&b| is_binary_byte(b))
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() && !filename.starts_with('.') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn unsupported(filename: &str) -> CoreError {
    CoreError::Validation(format!(
        "Unsupported file type: {filename}. Only PDF, Markdown, and TXT files are allowed"
    ))
}

/// Validate one upload.
///
/// PDF content is accepted only under a `.pdf` name; textual content only
/// under `.md` or `.txt`. Anything else is rejected.
pub fn validate_upload(filename: &str, data: Vec<u8>) -> Result<UploadedFile, CoreError> {
    let ext = extension(filename).ok_or_else(|| unsupported(filename))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(unsupported(filename));
    }

    let sniffed = sniff_content_type(&data);
    let content_type = if sniffed == MIME_PDF {
        if ext != "pdf" {
            return Err(unsupported(filename));
        }
        MIME_PDF
    } else if sniffed.starts_with("text/") {
        if !TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return Err(unsupported(filename));
        }
        MIME_TEXT
    } else {
        return Err(unsupported(filename));
    };

    Ok(UploadedFile {
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        data,
    })
}

/// Validate a whole submission. At least one file is required and every
/// file must pass; the first failure wins.
pub fn validate_uploads(
    files: impl IntoIterator<Item = (String, Vec<u8>)>,
) -> Result<Vec<UploadedFile>, CoreError> {
    let validated = files
        .into_iter()
        .map(|(name, data)| validate_upload(&name, data))
        .collect::<Result<Vec<_>, _>>()?;
    if validated.is_empty() {
        return Err(CoreError::Validation("No files uploaded".to_string()));
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n";

    #[test]
    fn accepts_markdown_text() {
        let file = validate_upload("notes.md", b"# Title\n\nBody".to_vec()).unwrap();
        assert_eq!(file.content_type, "text/plain");
        assert!(!file.is_pdf());
    }

    #[test]
    fn accepts_pdf() {
        let file = validate_upload("paper.PDF", PDF_BYTES.to_vec()).unwrap();
        assert!(file.is_pdf());
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validate_upload("data.exe", b"MZ\x90\x00".to_vec()).unwrap_err();
        assert_matches!(err, CoreError::Validation(m) if m.contains("data.exe"));
    }

    #[test]
    fn rejects_pdf_bytes_under_text_name() {
        assert_matches!(
            validate_upload("notes.txt", PDF_BYTES.to_vec()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn rejects_text_under_pdf_name() {
        assert_matches!(
            validate_upload("fake.pdf", b"just words".to_vec()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn rejects_binary_under_text_name() {
        assert_matches!(
            validate_upload("blob.txt", vec![0x00, 0x01, 0x02, 0xFF]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn rejects_missing_extension() {
        assert_matches!(
            validate_upload("README", b"hello".to_vec()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn empty_submission_is_rejected() {
        assert_matches!(
            validate_uploads(Vec::new()),
            Err(CoreError::Validation(m)) if m == "No files uploaded"
        );
    }

    #[test]
    fn one_bad_file_rejects_the_batch() {
        let files = vec![
            ("a.md".to_string(), b"ok".to_vec()),
            ("b.exe".to_string(), b"nope".to_vec()),
        ];
        assert_matches!(validate_uploads(files), Err(CoreError::Validation(m)) if m.contains("b.exe"));
    }
}
