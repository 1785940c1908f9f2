//! Documents addressable by byte offset and by line index.
//!
//! A [`Document`] owns its text. Line addressing is backed by a [`LineIndex`]
//! that records where every line starts, so converting between the two
//! addressing modes is a binary search rather than a rescan.

use std::fs;
use std::io::Write;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// Byte offsets of line starts within a piece of text.
///
/// A line unit spans from its first byte up to and including its terminator
/// (`\n` or `\r\n`). The last line may have no terminator. Empty text has no
/// lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::new();
        if !text.is_empty() {
            starts.push(0);
        }
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' && idx + 1 < text.len() {
                starts.push(idx + 1);
            }
        }
        Self {
            starts,
            len: text.len(),
        }
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Offset of the first byte of `line`.
    ///
    /// `line == line_count()` yields the end of the text, which lets callers
    /// treat "one past the last line" as a valid boundary.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        match line.cmp(&self.starts.len()) {
            std::cmp::Ordering::Less => Some(self.starts[line]),
            std::cmp::Ordering::Equal => Some(self.len),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Offset just past the terminator of `line`.
    pub fn line_end(&self, line: usize) -> Option<usize> {
        if line >= self.starts.len() {
            return None;
        }
        Some(self.starts.get(line + 1).copied().unwrap_or(self.len))
    }

    /// Index of the line containing `offset`.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// Content of `line` in `text`, terminator excluded.
    pub fn line<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self.line_end(line)?;
        let raw = &text[start..end];
        let raw = raw.strip_suffix('\n').unwrap_or(raw);
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }
}

/// An owned text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    index: LineIndex,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self { text, index }
    }

    /// Read a whole document from disk. The file handle is closed on return.
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    pub fn line_count(&self) -> usize {
        self.index.line_count()
    }

    /// Line content without its terminator.
    pub fn line(&self, line: usize) -> Option<&str> {
        self.index.line(&self.text, line)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.line_count()).filter_map(move |line| self.line(line))
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.index.line_start(line)
    }

    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.index.line_of_offset(offset)
    }

    /// Dominant line separator, see [`line_separator`].
    pub fn line_separator(&self) -> &'static str {
        line_separator(&self.text)
    }

    pub fn content_hash(&self) -> u64 {
        content_hash(&self.text)
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Line separator of `text`, judged by its first terminator. Defaults to `\n`.
pub fn line_separator(text: &str) -> &'static str {
    match text.find('\n') {
        Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

/// Rewrite every line terminator in `text` as `separator`.
pub fn normalize_line_endings(text: &str, separator: &str) -> String {
    let lf = text.replace("\r\n", "\n");
    if separator == "\n" {
        lf
    } else {
        lf.replace('\n', separator)
    }
}

/// xxh3 hash of a text, used to prove a document was left untouched.
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Replace a file's content atomically: tempfile + fsync + rename.
///
/// Either the full new content lands or the previous content stays in place.
/// The modification time is refreshed afterwards so watchers notice the change.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    // Tempfile must live on the same filesystem for rename to be atomic
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    // Tempfiles are created owner-only; keep the replaced file's mode
    match fs::metadata(path) {
        Ok(metadata) => temp.as_file().set_permissions(metadata.permissions())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_basic() {
        let index = LineIndex::new("one\ntwo\nthree");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_start(0), Some(0));
        assert_eq!(index.line_start(1), Some(4));
        assert_eq!(index.line_start(2), Some(8));
        assert_eq!(index.line_start(3), Some(13));
        assert_eq!(index.line_start(4), None);
        assert_eq!(index.line_end(2), Some(13));
    }

    #[test]
    fn test_trailing_newline_does_not_add_line() {
        let index = LineIndex::new("a\nb\n");
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.line_end(1), Some(4));
    }

    #[test]
    fn test_empty_text_has_no_lines() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 0);
        assert_eq!(index.line_start(0), Some(0));
        assert_eq!(index.line_end(0), None);
    }

    #[test]
    fn test_line_of_offset() {
        let index = LineIndex::new("ab\ncd\nef");
        assert_eq!(index.line_of_offset(0), 0);
        assert_eq!(index.line_of_offset(2), 0);
        assert_eq!(index.line_of_offset(3), 1);
        assert_eq!(index.line_of_offset(7), 2);
        assert_eq!(index.line_of_offset(100), 2);
    }

    #[test]
    fn test_line_content_strips_crlf() {
        let doc = Document::new("first\r\nsecond\r\n");
        assert_eq!(doc.line(0), Some("first"));
        assert_eq!(doc.line(1), Some("second"));
        assert_eq!(doc.line_separator(), "\r\n");
        assert_eq!(doc.lines().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_line_separator_defaults_to_lf() {
        assert_eq!(Document::new("no newline").line_separator(), "\n");
        assert_eq!(Document::new("a\nb").line_separator(), "\n");
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\nc", "\n"), "a\nb\nc");
        assert_eq!(normalize_line_endings("a\r\nb\nc", "\r\n"), "a\r\nb\r\nc");
        assert_eq!(normalize_line_endings("plain", "\r\n"), "plain");
    }

    #[test]
    fn test_content_hash_tracks_text() {
        let a = Document::new("same");
        let b = Document::new(String::from("same"));
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), Document::new("other").content_hash());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("page.html");
        fs::write(&file_path, "<p>old</p>").unwrap();

        write_atomic(&file_path, "<p>new</p>").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "<p>new</p>");
        let doc = Document::read(&file_path).unwrap();
        assert_eq!(doc.text(), "<p>new</p>");
    }

    #[test]
    fn test_write_atomic_creates_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("fresh.html");

        write_atomic(&file_path, "<p>hi</p>").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "<p>hi</p>");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("index.html");
        fs::write(&file_path, "<p>old</p>").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        write_atomic(&file_path, "<p>new</p>").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
