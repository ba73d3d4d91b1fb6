use crate::ast::Import;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// One rewrite as a byte-span replacement of a unit's source.
///
/// Besides the replaced span an edit carries what the rewrite needs around
/// it: imports to add to the unit and comment lines to place before the
/// statement holding the span. [`splice`] renders a set of edits in memory;
/// [`Edit::apply_batch`] writes them to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use = "Edit does nothing until spliced or applied"]
pub struct Edit {
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    pub new_text: String,
    /// Verification of what we expect to find before applying
    #[serde(skip)]
    pub expected_before: EditVerification,
    /// Fully qualified name of the rule that produced the edit.
    pub rule: String,
    #[serde(serialize_with = "import_lines")]
    pub imports: Vec<Import>,
    pub comments_before: Vec<String>,
}

fn import_lines<S: serde::Serializer>(imports: &[Import], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(imports.iter().map(ToString::to_string))
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
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
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
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {}:{byte_start}", file.display())]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Overlapping edits at {}:{byte_start}", file.display())]
    Overlap { file: PathBuf, byte_start: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Invalid edit would create malformed UTF-8")]
    InvalidUtf8Edit,
}

/// Result of applying the edits of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    Applied { file: PathBuf, edits: usize },
    /// Every edit's span already holds its new text.
    AlreadyApplied { file: PathBuf },
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
            rule: String::new(),
            imports: Vec::new(),
            comments_before: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn with_imports(mut self, imports: Vec<Import>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments_before = comments;
        self
    }

    /// Checks the span against `content`. Returns whether the new text is
    /// already in place.
    fn validate(&self, content: &str) -> Result<bool, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }
        let current = std::str::from_utf8(&content.as_bytes()[self.byte_start..self.byte_end])?;
        if current == self.new_text {
            return Ok(true);
        }
        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }
        Ok(false)
    }

    /// Apply edits to their files, one atomic write per file.
    ///
    /// All edits of a file are verified before anything is written.
    pub fn apply_batch(mut edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
        edits.sort_by(|a, b| a.file.cmp(&b.file).then(a.byte_start.cmp(&b.byte_start)));
        let mut results = Vec::new();
        for group in edits.chunk_by(|a, b| a.file == b.file) {
            results.push(apply_file_edits(group)?);
        }
        Ok(results)
    }
}

fn apply_file_edits(edits: &[Edit]) -> Result<EditResult, EditError> {
    let file = &edits[0].file;
    let original = fs::read(file)?;
    let original = std::str::from_utf8(&original)?;
    let mut pending = Vec::with_capacity(edits.len());
    for edit in edits {
        if !edit.validate(original)? {
            pending.push(edit.clone());
        }
    }
    if pending.is_empty() {
        return Ok(EditResult::AlreadyApplied { file: file.clone() });
    }
    let updated = splice(original, &pending)?;
    atomic_write(file, updated.as_bytes())?;
    // Bump mtime so build tools notice the change
    filetime::set_file_mtime(file, filetime::FileTime::now())?;
    tracing::debug!(file = %file.display(), edits = pending.len(), "applied edits");
    Ok(EditResult::Applied {
        file: file.clone(),
        edits: pending.len(),
    })
}

/// Renders `edits` over `source`.
///
/// Imports go after the last import line (or at the top), each once and only
/// if the unit does not spell it already. Comments become `// ` lines, indented
/// like the line they precede, in front of the line where the edit starts.
pub fn splice(source: &str, edits: &[Edit]) -> Result<String, EditError> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by_key(|edit| (edit.byte_start, edit.byte_end));
    for edit in &ordered {
        edit.validate(source)?;
        if !source.is_char_boundary(edit.byte_start) || !source.is_char_boundary(edit.byte_end) {
            return Err(EditError::InvalidUtf8Edit);
        }
    }
    for pair in ordered.windows(2) {
        if pair[0].byte_end > pair[1].byte_start {
            return Err(EditError::Overlap {
                file: pair[1].file.clone(),
                byte_start: pair[1].byte_start,
            });
        }
    }

    let mut inserts: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let present: Vec<&str> = source.lines().map(str::trim).collect();
    let mut imports: Vec<String> = Vec::new();
    for import in ordered.iter().flat_map(|edit| &edit.imports) {
        let line = import.to_string();
        if !present.contains(&line.as_str()) && !imports.contains(&line) {
            imports.push(line);
        }
    }
    if !imports.is_empty() {
        let (at, needs_newline) = import_anchor(source);
        let mut block = String::new();
        if needs_newline {
            block.push('\n');
        }
        for line in imports {
            block.push_str(&line);
            block.push('\n');
        }
        inserts.entry(at).or_default().push(block);
    }
    for edit in ordered.iter().filter(|edit| !edit.comments_before.is_empty()) {
        let mut at = line_start(source, edit.byte_start);
        while let Some(cover) = ordered
            .iter()
            .find(|other| other.byte_start < at && at < other.byte_end)
        {
            at = line_start(source, cover.byte_start);
        }
        let indent: String = source[at..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        let slot = inserts.entry(at).or_default();
        for comment in &edit.comments_before {
            let line = format!("{indent}// {comment}\n");
            if !slot.contains(&line) {
                slot.push(line);
            }
        }
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut pending = inserts.into_iter().peekable();
    for edit in ordered {
        while let Some((at, _)) = pending.peek() {
            if *at > edit.byte_start {
                break;
            }
            if let Some((at, texts)) = pending.next() {
                out.push_str(&source[cursor..at]);
                texts.iter().for_each(|text| out.push_str(text));
                cursor = at;
            }
        }
        out.push_str(&source[cursor..edit.byte_start]);
        out.push_str(&edit.new_text);
        cursor = edit.byte_end;
    }
    for (at, texts) in pending {
        out.push_str(&source[cursor..at]);
        texts.iter().for_each(|text| out.push_str(text));
        cursor = at;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |idx| idx + 1)
}

/// Offset just past the last import line, and whether a newline must be
/// supplied because that line ends the file.
fn import_anchor(source: &str) -> (usize, bool) {
    let mut anchor = (0, false);
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        offset += line.len();
        if line.trim_start().starts_with("import ") {
            anchor = (offset, !line.ends_with('\n'));
        }
    }
    anchor
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: &str = "import java.util.Optional;\n\
                        String x = \"a\";\n    Object o = x == null ? Optional.empty() : Optional.of(x);\n";

    fn span(source: &str, text: &str) -> (usize, usize) {
        let start = source.find(text).unwrap();
        (start, start + text.len())
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_validation_invalid_range() {
        let edit = Edit::new("Test.sketch", 5, 20, "replacement", "");
        assert!(matches!(
            edit.validate("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
        let inverted = Edit::new("Test.sketch", 10, 5, "replacement", "");
        assert!(matches!(
            inverted.validate("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_splice_replaces_span() {
        let before = "x == null ? Optional.empty() : Optional.of(x)";
        let (start, end) = span(UNIT, before);
        let edit = Edit::new("Test.sketch", start, end, "Optional.ofNullable(x)", before);
        let out = splice(UNIT, &[edit]).unwrap();
        assert!(out.contains("Object o = Optional.ofNullable(x);"));
        assert!(out.starts_with("import java.util.Optional;\n"));
    }

    #[test]
    fn test_splice_adds_imports_after_last_import() {
        let (start, end) = span(UNIT, "Optional.of(x)");
        let edit = Edit::new("Test.sketch", start, end, "Streams.first(x)", "Optional.of(x)")
            .with_imports(vec![
                Import::class("com.google.common.collect.Streams"),
                Import::class("java.util.Optional"),
            ]);
        let out = splice(UNIT, &[edit]).unwrap();
        assert!(out.starts_with(
            "import java.util.Optional;\nimport com.google.common.collect.Streams;\nString x"
        ));
    }

    #[test]
    fn test_splice_indents_comments() {
        let (start, end) = span(UNIT, "Optional.of(x)");
        let edit = Edit::new("Test.sketch", start, end, "Optional.of(x)", "Optional.of(x)")
            .with_comments(vec!["check nullability".into()]);
        let out = splice(UNIT, &[edit]).unwrap();
        assert!(out.contains("\"a\";\n    // check nullability\n    Object o"));
    }

    #[test]
    fn test_splice_rejects_overlap() {
        let edits = vec![
            Edit::new("Test.sketch", 0, 10, "a", &UNIT[0..10]),
            Edit::new("Test.sketch", 5, 12, "b", &UNIT[5..12]),
        ];
        assert!(matches!(splice(UNIT, &edits), Err(EditError::Overlap { .. })));
    }

    #[test]
    fn test_batch_edits_same_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.sketch");
        fs::write(&file_path, b"line1\nline2\nline3\n").unwrap();

        let edits = vec![
            Edit::new(&file_path, 12, 17, "LINE3", "line3"),
            Edit::new(&file_path, 0, 5, "LINE1", "line1"),
            Edit::new(&file_path, 6, 11, "LINE2", "line2"),
        ];
        let results = Edit::apply_batch(edits.clone()).unwrap();
        assert_eq!(
            results,
            vec![EditResult::Applied {
                file: file_path.clone(),
                edits: 3
            }]
        );
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "LINE1\nLINE2\nLINE3\n"
        );

        let again = Edit::apply_batch(edits).unwrap();
        assert!(matches!(again[0], EditResult::AlreadyApplied { .. }));
    }

    #[test]
    fn test_batch_detects_changed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.sketch");
        fs::write(&file_path, b"hello world").unwrap();
        let edit = Edit::new(&file_path, 0, 5, "HELLO", "howdy");
        assert!(matches!(
            Edit::apply_batch(vec![edit]),
            Err(EditError::BeforeTextMismatch { .. })
        ));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "hello world");
    }

    #[test]
    fn test_json_shape() {
        let edit = Edit::new("Test.sketch", 1, 2, "b", "a")
            .with_rule("optional.OptionalIsEmpty")
            .with_imports(vec![Import::class("java.util.Optional")]);
        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["rule"], "optional.OptionalIsEmpty");
        assert_eq!(json["imports"][0], "import java.util.Optional;");
        assert!(json.get("expected_before").is_none());
    }
}
