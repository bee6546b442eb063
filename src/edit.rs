use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// All high-level operations (definition inserts, list splices, reference
/// removals) compile down to this single primitive. Intelligence lives in span
/// acquisition, not application: spans come from the parsed manifest model,
/// and every edit re-verifies the bytes it is about to replace.
///
/// Edits operate on in-memory buffers. The manifest is read once, transformed
/// through a series of buffer edits, and persisted once via [`atomic_write`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied to a buffer"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => {
                let actual_hash = xxh3_64(text.as_bytes());
                actual_hash == *expected_hash
            }
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Get hash value regardless of variant.
    pub fn hash(&self) -> u64 {
        match self {
            EditVerification::Hash(h) => *h,
            EditVerification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in buffer of length {buffer_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        buffer_len: usize,
    },

    #[error("Byte offset {offset} is not a character boundary")]
    NotCharBoundary { offset: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    /// Create an edit with explicit verification strategy.
    pub fn with_verification(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        verification: EditVerification,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Zero-width insertion at a byte offset.
    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Edit::new(at, at, new_text, "")
    }

    /// Deletion of a span, verified against the text currently occupying it.
    pub fn delete(byte_start: usize, byte_end: usize, expected_before: impl Into<String>) -> Self {
        Edit::new(byte_start, byte_end, "", expected_before)
    }

    /// Validate the edit against the current buffer contents.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation succeeds.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                buffer_len: content.len(),
            });
        }

        for offset in [self.byte_start, self.byte_end] {
            if !content.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }

        let current_text = &content[self.byte_start..self.byte_end];

        // Replacing a span with identical text verifies trivially (idempotency).
        if current_text == self.new_text {
            return Ok(current_text);
        }

        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }

    /// Apply this single edit to a buffer, returning the new buffer.
    pub fn apply_to(&self, content: &str) -> Result<String, EditError> {
        self.validate(content)?;

        let mut new_content =
            String::with_capacity(content.len() + self.new_text.len() - (self.byte_end - self.byte_start));
        new_content.push_str(&content[..self.byte_start]);
        new_content.push_str(&self.new_text);
        new_content.push_str(&content[self.byte_end..]);
        Ok(new_content)
    }

    /// Apply multiple edits to the same buffer in a single pass.
    ///
    /// Edits are sorted by byte_start descending and applied bottom-to-top
    /// to avoid offset invalidation. All edits are validated against the
    /// original buffer before any is applied, and overlapping spans are
    /// rejected.
    pub fn apply_batch_to(mut edits: Vec<Edit>, content: &str) -> Result<String, EditError> {
        if edits.is_empty() {
            return Ok(content.to_string());
        }

        // Descending by byte_start; zero-width inserts at the same offset keep
        // their relative order via the stable sort.
        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(content)?;
        }

        // For non-overlapping regions: earlier edit's end <= later edit's start.
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::InvalidByteRange {
                    byte_start: later.byte_start,
                    byte_end: earlier.byte_end,
                    buffer_len: content.len(),
                });
            }
        }

        let mut new_content = content.to_string();
        for edit in &edits {
            new_content.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
        }

        Ok(new_content)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// This ensures crash safety - either the full write succeeds or nothing
/// changes. The mtime is bumped afterwards so file watchers and incremental
/// build systems notice the replacement.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), EditError> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content.as_bytes())?;

    // Flush to disk (fsync)
    temp.as_file().sync_all()?;

    // Atomic rename
    temp.persist(path).map_err(|e| e.error)?;

    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_edit_verification_exact_match() {
        let text = "hello world";
        let verify = EditVerification::ExactMatch(text.to_string());
        assert!(verify.matches(text));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "hello world";
        let hash = xxh3_64(text.as_bytes());
        let verify = EditVerification::Hash(hash);
        assert!(verify.matches(text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_small() {
        let text = "small";
        let verify = EditVerification::from_text(text);
        assert!(matches!(verify, EditVerification::ExactMatch(_)));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
    }

    #[test]
    fn test_edit_validation_invalid_range() {
        let content = "hello world";
        let edit = Edit::new(5, 20, "replacement", "");
        let result = edit.validate(content);
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_inverted_range() {
        let content = "hello world";
        let edit = Edit::new(10, 5, "replacement", "");
        let result = edit.validate(content);
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_char_boundary() {
        let content = "héllo";
        let edit = Edit::new(2, 3, "x", "");
        let result = edit.validate(content);
        assert!(matches!(result, Err(EditError::NotCharBoundary { .. })));
    }

    #[test]
    fn test_edit_validation_mismatch() {
        let content = "hello world";
        let edit = Edit::new(0, 5, "howdy", "jello");
        let result = edit.validate(content);
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_edit_idempotency_check() {
        let content = "hello world";
        let edit = Edit::new(0, 5, "hello", "hello");
        let result = edit.validate(content);
        assert!(result.is_ok());
    }

    #[test]
    fn test_apply_to_replaces_span() {
        let content = "original content";
        let edit = Edit::new(0, 8, "modified", "original");
        let new_content = edit.apply_to(content).unwrap();
        assert_eq!(new_content, "modified content");
    }

    #[test]
    fn test_insert_is_zero_width() {
        let content = "ab";
        let edit = Edit::insert(1, "X");
        assert_eq!(edit.apply_to(content).unwrap(), "aXb");
    }

    #[test]
    fn test_delete_verifies_span() {
        let content = "abcdef";
        let edit = Edit::delete(2, 4, "cd");
        assert_eq!(edit.apply_to(content).unwrap(), "abef");

        let bad = Edit::delete(2, 4, "xy");
        assert!(bad.apply_to(content).is_err());
    }

    #[test]
    fn test_batch_edits_same_buffer() {
        let content = "line1\nline2\nline3\n";
        let edits = vec![
            Edit::new(0, 5, "LINE1", "line1"),
            Edit::new(6, 11, "LINE2", "line2"),
            Edit::new(12, 17, "LINE3", "line3"),
        ];

        let new_content = Edit::apply_batch_to(edits, content).unwrap();
        assert_eq!(new_content, "LINE1\nLINE2\nLINE3\n");
    }

    #[test]
    fn test_batch_rejects_overlap() {
        let content = "abcdef";
        let edits = vec![Edit::new(0, 4, "....", "abcd"), Edit::new(2, 6, "....", "cdef")];
        let result = Edit::apply_batch_to(edits, content);
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_atomic_write_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, b"original content").unwrap();

        atomic_write(&file_path, "modified content").unwrap();
        let new_content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(new_content, "modified content");
    }
}
