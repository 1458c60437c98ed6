//! Entry types shared by the packer, parser, validator and unpacker.

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Filename token marking the response's self-declared manifest.
pub const VALIDATE_TOKEN: &str = "@validate";

/// How a [`FileEntry`]'s content is encoded inside its fence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Content is the literal file text.
    #[default]
    Utf8,
    /// Content is base64 of the file bytes (fence tag `base64`).
    Base64,
}

impl Encoding {
    /// Encoding implied by a fence language tag.
    pub fn from_lang(lang: &str) -> Self {
        if lang == "base64" {
            Self::Base64
        } else {
            Self::Utf8
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => write!(f, "utf8"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// A decoded file or command block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Display name from the header brackets (may be empty).
    pub label: String,
    /// Target path, or `@name` for a command.
    pub filename: String,
    /// Fence language tag.
    #[serde(rename = "type")]
    pub lang: String,
    /// Decoded body; every line carries its trailing newline.
    pub content: String,
    pub encoding: Encoding,
}

impl FileEntry {
    pub fn new(label: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            filename: filename.into(),
            lang: String::new(),
            content: String::new(),
            encoding: Encoding::Utf8,
        }
    }

    /// Builder-style content setter, mostly for tests and hosts.
    pub fn with_content(mut self, lang: impl Into<String>, content: impl Into<String>) -> Self {
        self.lang = lang.into();
        self.encoding = Encoding::from_lang(&self.lang);
        self.content = content.into();
        self
    }

    /// Whether the filename names a command instead of a path.
    pub fn is_command(&self) -> bool {
        self.filename.starts_with('@')
    }

    /// Command name without the `@` prefix.
    pub fn command_name(&self) -> Option<&str> {
        self.filename.strip_prefix('@')
    }

    pub fn is_validate(&self) -> bool {
        self.filename == VALIDATE_TOKEN
    }

    /// Content with no visible characters.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Non-blank content lines, trimmed. Commands take their arguments this way.
    pub fn argument_lines(&self) -> impl Iterator<Item = &str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    /// Bytes to write to disk, decoding base64 payloads.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self.encoding {
            Encoding::Utf8 => Ok(self.content.as_bytes().to_vec()),
            Encoding::Base64 => {
                let packed: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                base64::engine::general_purpose::STANDARD.decode(packed)
            }
        }
    }
}

/// A recoverable parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// What went wrong.
    pub error: String,
    /// The offending raw line, verbatim.
    pub content: String,
    /// 1-based line number.
    pub line: usize,
}

impl FileError {
    pub fn new(error: impl Into<String>, content: impl Into<String>, line: usize) -> Self {
        Self {
            error: error.into(),
            content: content.into(),
            line,
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.error, self.content)
    }
}

/// One decoded unit: either a complete entry or a recoverable failure.
pub type Decoded = Result<FileEntry, FileError>;

/// Insertion-ordered filename → label map with unique keys.
///
/// Re-inserting an existing filename replaces its label but keeps the
/// position of the first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, label: impl Into<String>) {
        let filename = filename.into();
        let label = label.into();
        match self.entries.iter_mut().find(|(name, _)| *name == filename) {
            Some(slot) => slot.1 = label,
            None => self.entries.push((filename, label)),
        }
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, label)| label.as_str())
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.get(filename).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, label)| (name.as_str(), label.as_str()))
    }

    /// Keys in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        keys
    }
}

impl From<Vec<(String, String)>> for Manifest {
    fn from(pairs: Vec<(String, String)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for (filename, label) in iter {
            manifest.insert(filename, label);
        }
        manifest
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (filename, label) in &self.entries {
            map.serialize_entry(filename, label)?;
        }
        map.end()
    }
}

/// Everything decoded from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedResult {
    /// Complete entries (files and commands) in document order.
    pub correct: Vec<FileEntry>,
    /// Recoverable failures in document order.
    pub failed: Vec<FileError>,
    /// The first `@validate` entry, if any.
    pub validate: Option<FileEntry>,
    /// filename → label for every entry except `@validate`.
    pub files: Manifest,
    /// filename → label declared by the `@validate` body.
    pub requested: Manifest,
    /// Whether `files` and `requested` name the same set of filenames.
    pub is_valid: bool,
}

impl ParsedResult {
    /// Entries that are file writes (not commands).
    pub fn file_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.correct.iter().filter(|entry| !entry.is_command())
    }

    /// Command entries, excluding the `@validate` manifest.
    pub fn command_entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.correct
            .iter()
            .filter(|entry| entry.is_command() && !entry.is_validate())
    }
}

/// Output of packing a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackResult {
    /// Fully expanded prompt body.
    pub text: String,
    /// `path (N bytes)` per inlined file, in resolution order.
    pub injected: Vec<String>,
    /// One descriptor per checklist target that could not be read.
    pub errors: Vec<String>,
}
