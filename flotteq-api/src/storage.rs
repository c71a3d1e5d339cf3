/// File storage for vehicle photos, invoice documents and inspection reports
///
/// Files live under the configured upload directory as
/// `<category>/<uuid>.<ext>`. The database stores only that relative path.
/// The content type is sniffed from the file's leading bytes; the type
/// announced by the client is not trusted.
///
/// # Example
///
/// ```no_run
/// use flotteq_api::storage::{FileCategory, Storage};
///
/// # async fn example(data: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let storage = Storage::new("uploads", 10 * 1024 * 1024);
/// let stored = storage.save(FileCategory::Photo, &data).await?;
/// println!("stored {} ({} bytes, sha256 {})", stored.path, stored.size, stored.checksum);
/// # Ok(())
/// # }
/// ```

use axum::extract::Multipart;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the multipart field carrying the file
pub const FILE_FIELD: &str = "file";

const IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const DOCUMENT_TYPES: [&str; 4] = ["application/pdf", "image/jpeg", "image/png", "image/webp"];

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("Unsupported file type; allowed: {allowed}")]
    UnsupportedType { allowed: String },

    #[error("Missing multipart field '{0}'")]
    MissingFile(&'static str),

    #[error("Empty file")]
    Empty,

    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    #[error("Invalid stored path")]
    InvalidPath,

    #[error("Stored file not found")]
    NotFound,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an upload is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Photo,
    InvoiceDocument,
    InspectionReport,
}

impl FileCategory {
    pub fn directory(&self) -> &'static str {
        match self {
            FileCategory::Photo => "photos",
            FileCategory::InvoiceDocument => "invoices",
            FileCategory::InspectionReport => "inspections",
        }
    }

    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            FileCategory::Photo => &IMAGE_TYPES,
            FileCategory::InvoiceDocument | FileCategory::InspectionReport => &DOCUMENT_TYPES,
        }
    }
}

/// A file received in a multipart body
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side name, for display and downloads
    pub file_name: String,
    pub data: Bytes,
}

/// A file written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the upload directory
    pub path: String,
    pub content_type: &'static str,
    pub size: i64,

    /// Hex SHA-256 of the content
    pub checksum: String,
}

/// Upload directory handle
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    max_bytes: usize,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks size and type, then writes the file under a fresh name
    pub async fn save(&self, category: FileCategory, data: &[u8]) -> Result<StoredFile, StorageError> {
        let content_type = self.validate(category, data)?;

        let relative = format!(
            "{}/{}.{}",
            category.directory(),
            Uuid::new_v4(),
            extension_for(content_type)
        );
        let absolute = self.root.join(&relative);

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, data).await?;

        debug!(path = %relative, size = data.len(), "Stored upload");

        Ok(StoredFile {
            path: relative,
            content_type,
            size: data.len() as i64,
            checksum: sha256_hex(data),
        })
    }

    /// Size and content checks, returning the sniffed type
    pub fn validate(&self, category: FileCategory, data: &[u8]) -> Result<&'static str, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }

        if data.len() > self.max_bytes {
            return Err(StorageError::TooLarge { max: self.max_bytes });
        }

        sniff_content_type(data)
            .filter(|sniffed| category.allowed_types().contains(sniffed))
            .ok_or_else(|| StorageError::UnsupportedType {
                allowed: category.allowed_types().join(", "),
            })
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a stored file; a file already gone is not an error
    pub async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes files after their rows are gone; failures are only logged
    pub async fn remove_all<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            if let Err(e) = self.remove(path.as_ref()).await {
                warn!(path = path.as_ref(), error = %e, "Failed to remove stored file");
            }
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if !safe {
            return Err(StorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// Reads the `file` field of a multipart body, ignoring other fields
pub async fn read_upload(multipart: &mut Multipart) -> Result<Upload, StorageError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StorageError::Multipart(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(sanitize_file_name)
            .unwrap_or_else(|| "upload".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| StorageError::Multipart(e.to_string()))?;

        return Ok(Upload { file_name, data });
    }

    Err(StorageError::MissingFile(FILE_FIELD))
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Recognizes the supported formats by their magic bytes
pub fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Content type of a stored file, from the extension it was saved with
pub fn content_type_for_path(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Keeps the last path segment and drops characters unsafe in headers
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(255)
        .collect();

    if cleaned.trim().is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const PDF: &[u8] = b"%PDF-1.7\n...";

    fn storage(max_bytes: usize) -> Storage {
        Storage::new(
            std::env::temp_dir().join(format!("flotteq-storage-{}", Uuid::new_v4())),
            max_bytes,
        )
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(PNG), Some("image/png"));
        assert_eq!(sniff_content_type(PDF), Some("application/pdf"));
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_content_type(b"GIF89a"), None);
        assert_eq!(sniff_content_type(b""), None);
    }

    #[test]
    fn test_photos_reject_pdf_documents_accept_it() {
        let storage = storage(1024);

        assert!(matches!(
            storage.validate(FileCategory::Photo, PDF),
            Err(StorageError::UnsupportedType { .. })
        ));
        assert_eq!(
            storage.validate(FileCategory::InvoiceDocument, PDF).unwrap(),
            "application/pdf"
        );
        assert_eq!(storage.validate(FileCategory::Photo, PNG).unwrap(), "image/png");
    }

    #[test]
    fn test_size_limits() {
        let storage = storage(8);

        assert!(matches!(
            storage.validate(FileCategory::Photo, PNG),
            Err(StorageError::TooLarge { max: 8 })
        ));
        assert!(matches!(
            storage.validate(FileCategory::Photo, &[]),
            Err(StorageError::Empty)
        ));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let storage = storage(1024);

        assert!(storage.resolve("photos/abc.png").is_ok());
        assert!(matches!(storage.resolve("../etc/passwd"), Err(StorageError::InvalidPath)));
        assert!(matches!(storage.resolve("/etc/passwd"), Err(StorageError::InvalidPath)));
        assert!(matches!(storage.resolve("photos/../../x"), Err(StorageError::InvalidPath)));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("C:\\scans\\facture.pdf"), "facture.pdf");
        assert_eq!(sanitize_file_name("../../ct\"report\".pdf"), "ctreport.pdf");
        assert_eq!(sanitize_file_name("   "), "upload");
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let storage = storage(1024);

        let stored = storage.save(FileCategory::InspectionReport, PDF).await.unwrap();
        assert!(stored.path.starts_with("inspections/"));
        assert!(stored.path.ends_with(".pdf"));
        assert_eq!(stored.size, PDF.len() as i64);
        assert_eq!(stored.checksum, sha256_hex(PDF));
        assert_eq!(content_type_for_path(&stored.path), "application/pdf");

        assert_eq!(storage.read(&stored.path).await.unwrap(), PDF);

        storage.remove(&stored.path).await.unwrap();
        assert!(matches!(storage.read(&stored.path).await, Err(StorageError::NotFound)));

        // Removing twice is fine
        storage.remove(&stored.path).await.unwrap();
    }
}
