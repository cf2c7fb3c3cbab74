use std::fmt;

/// Identity used for the modified buffer when a request carries no path.
pub const PLACEHOLDER_PATH: &str = "untitled";

/// Suffix that derives the original buffer's identity from the modified one.
pub const BASE_SUFFIX: &str = ":base";

/// Stable identity of a text buffer (URI-like).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferId(String);

impl BufferId {
    /// Identity of the "modified" side: the path itself, or the placeholder.
    pub fn modified(path: &str) -> Self {
        if path.is_empty() {
            BufferId(PLACEHOLDER_PATH.to_string())
        } else {
            BufferId(path.to_string())
        }
    }

    /// Identity of the "original" side: an explicit original path when present,
    /// otherwise the modified identity plus [`BASE_SUFFIX`]. Never equal to
    /// `modified`, so the two sides can't alias one buffer.
    pub fn original(modified: &BufferId, original_path: Option<&str>) -> Self {
        match original_path.filter(|p| !p.is_empty()) {
            Some(p) if p != modified.0 => BufferId(p.to_string()),
            _ => BufferId(format!("{}{}", modified.0, BASE_SUFFIX)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mutable text document with a language and an identity.
#[derive(Debug)]
pub struct TextBuffer {
    id: BufferId,
    language: &'static str,
    text: String,
    /// Bumped on every content or language change.
    version: u64,
}

impl TextBuffer {
    pub fn new(id: BufferId, text: &str, language: &'static str) -> Self {
        TextBuffer {
            id,
            language,
            text: text.to_string(),
            version: 1,
        }
    }

    pub fn id(&self) -> &BufferId {
        &self.id
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of lines as an editor counts them: an empty document has one
    /// line, and a trailing newline opens a new empty last line.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Text of a 1-based line, without its terminator.
    pub fn line(&self, number: usize) -> Option<&str> {
        if number == 0 {
            return None;
        }
        self.text
            .split('\n')
            .nth(number - 1)
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    /// Returns true when the language actually changed.
    pub fn set_language(&mut self, language: &'static str) -> bool {
        if self.language == language {
            return false;
        }
        self.language = language;
        self.version += 1;
        true
    }

    /// Replace the whole content, but only when it differs.
    /// Returns true when the content changed.
    pub fn replace_text(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        self.version += 1;
        true
    }
}
