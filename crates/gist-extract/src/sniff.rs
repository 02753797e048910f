//! File type sniffing.
//!
//! Signature bytes win. The file name only decides when the signature is
//! missing or names a generic container (zip, OLE) that several formats
//! share.

use std::path::Path;

/// Broad file families the document extractor knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    WordProcessor,
    PlainText,
    Spreadsheet,
    /// Word-processor formats other than DOCX and legacy DOC
    UnsupportedDocument,
    Unknown,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::WordProcessor => "word_processor",
            FileKind::PlainText => "plain_text",
            FileKind::Spreadsheet => "spreadsheet",
            FileKind::UnsupportedDocument => "unsupported_document",
            FileKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const CONTAINER_MIMES: &[&str] = &[
    "application/zip",
    "application/x-ole-storage",
    "application/octet-stream",
];

/// Extensions `mime_guess` does not map to something useful.
const EXTENSION_TABLE: &[(&str, FileKind)] = &[
    ("txt", FileKind::PlainText),
    ("text", FileKind::PlainText),
    ("md", FileKind::PlainText),
    ("markdown", FileKind::PlainText),
    ("rst", FileKind::PlainText),
    ("log", FileKind::PlainText),
    ("csv", FileKind::PlainText),
    ("tsv", FileKind::PlainText),
    ("json", FileKind::PlainText),
    ("docx", FileKind::WordProcessor),
    ("doc", FileKind::WordProcessor),
    ("odt", FileKind::UnsupportedDocument),
    ("rtf", FileKind::UnsupportedDocument),
    ("pages", FileKind::UnsupportedDocument),
    ("xlsx", FileKind::Spreadsheet),
    ("xls", FileKind::Spreadsheet),
    ("ods", FileKind::Spreadsheet),
    ("numbers", FileKind::Spreadsheet),
];

/// Classify `bytes`, using `file_name` when the signature is inconclusive.
pub fn sniff(bytes: &[u8], file_name: Option<&str>) -> FileKind {
    if let Some(kind) = infer::get(bytes) {
        let mime = kind.mime_type();
        if !CONTAINER_MIMES.contains(&mime) {
            if let Some(kind) = kind_for_mime(mime) {
                return kind;
            }
        }
    }

    file_name.and_then(kind_for_name).unwrap_or(FileKind::Unknown)
}

fn kind_for_name(file_name: &str) -> Option<FileKind> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;

    if let Some((_, kind)) = EXTENSION_TABLE.iter().find(|(ext, _)| *ext == extension) {
        return Some(*kind);
    }

    mime_guess::from_ext(&extension)
        .first_raw()
        .and_then(kind_for_mime)
}

fn kind_for_mime(mime: &str) -> Option<FileKind> {
    match mime {
        "application/pdf" => Some(FileKind::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/msword" => Some(FileKind::WordProcessor),
        "application/vnd.oasis.opendocument.text"
        | "application/rtf"
        | "text/rtf"
        | "application/vnd.apple.pages"
        | "application/x-iwork-pages-sffpages" => Some(FileKind::UnsupportedDocument),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel"
        | "application/vnd.oasis.opendocument.spreadsheet" => Some(FileKind::Spreadsheet),
        "application/json" | "application/xml" | "application/javascript" => {
            Some(FileKind::PlainText)
        }
        m if m.starts_with("text/") => Some(FileKind::PlainText),
        _ => None,
    }
}
