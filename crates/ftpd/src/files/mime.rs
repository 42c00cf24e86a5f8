//! Extension to MIME type classification.

use std::collections::HashMap;
use std::path::Path;

/// Maps file extensions to MIME types.
pub trait MimeClassifier: Send + Sync {
    /// MIME type for a lowercase extension without the leading dot.
    fn mime_for_extension(&self, ext: &str) -> Option<String>;

    /// MIME type for a path, judged by its extension.
    ///
    /// Returns `None` for paths without an extension.
    fn mime_for_path(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if ext.is_empty() {
            return None;
        }
        self.mime_for_extension(&ext).map(|m| m.to_lowercase())
    }
}

const BUILTIN: &[(&str, &str)] = &[
    ("3gp", "video/3gpp"),
    ("aac", "audio/aac"),
    ("amr", "audio/amr"),
    ("avi", "video/x-msvideo"),
    ("bmp", "image/bmp"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("json", "application/json"),
    ("m4a", "audio/mp4"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("txt", "text/plain"),
    ("vcf", "text/x-vcard"),
    ("vcs", "text/x-vcalendar"),
    ("wav", "audio/x-wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xml", "text/xml"),
    ("zip", "application/zip"),
];

/// Built-in extension table with configurable overrides.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    types: HashMap<String, String>,
}

impl ExtensionTable {
    /// Table holding only the built-in mappings.
    pub fn builtin() -> Self {
        let types = BUILTIN
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { types }
    }

    /// Built-in table with `overrides` layered on top.
    ///
    /// Override keys are matched case-insensitively and may carry a leading
    /// dot.
    pub fn with_overrides<'a>(overrides: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut table = Self::builtin();
        for (ext, mime) in overrides {
            let ext = ext.trim_start_matches('.').to_lowercase();
            table.types.insert(ext, mime.clone());
        }
        table
    }

    /// Number of known extensions.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MimeClassifier for ExtensionTable {
    fn mime_for_extension(&self, ext: &str) -> Option<String> {
        self.types.get(ext).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let table = ExtensionTable::builtin();
        assert_eq!(table.mime_for_extension("jpg").as_deref(), Some("image/jpeg"));
        assert_eq!(table.mime_for_extension("unknown"), None);
    }

    #[test]
    fn test_path_extension_is_lowercased() {
        let table = ExtensionTable::builtin();
        assert_eq!(
            table.mime_for_path(Path::new("/a/Photo.JPG")).as_deref(),
            Some("image/jpeg")
        );
    }

    #[test]
    fn test_path_without_extension() {
        let table = ExtensionTable::builtin();
        assert_eq!(table.mime_for_path(Path::new("/a/README")), None);
        assert_eq!(table.mime_for_path(Path::new("/a/.hidden")), None);
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let mut overrides = HashMap::new();
        overrides.insert(".RAW".to_string(), "image/x-raw".to_string());
        overrides.insert("txt".to_string(), "Text/Markdown".to_string());
        let table = ExtensionTable::with_overrides(&overrides);

        assert_eq!(table.mime_for_extension("raw").as_deref(), Some("image/x-raw"));
        assert_eq!(
            table.mime_for_path(Path::new("notes.txt")).as_deref(),
            Some("text/markdown")
        );
        assert_eq!(table.len(), ExtensionTable::builtin().len() + 1);
    }
}
