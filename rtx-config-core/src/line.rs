use serde::{Deserialize, Serialize};

/// Options that control how raw configuration text is split into lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Prefixes that mark a whole line as a comment once leading whitespace is skipped.
    pub comment_markers: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            comment_markers: vec!["#".to_string()],
        }
    }
}

impl ParseOptions {
    fn is_comment(&self, trimmed: &str) -> bool {
        self.comment_markers
            .iter()
            .any(|marker| !marker.is_empty() && trimmed.starts_with(marker.as_str()))
    }
}

/// A single surviving configuration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    /// Line text with surrounding whitespace removed.
    pub text: String,
    /// 1-based ordinal in the source text.
    pub number: usize,
    /// Count of leading whitespace characters in the untrimmed line.
    pub depth: usize,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Command lines in source order.
    pub lines: Vec<Line>,
    /// Lines that were not blank, comments included.
    pub non_blank: usize,
    /// Comment lines that were dropped.
    pub comments: usize,
}

/// Split raw text into command lines.
///
/// CR, LF and CRLF are all treated as line boundaries. Blank lines and comment
/// lines are dropped but still consume a source ordinal, so `Line::number`
/// always points back at the original text.
pub fn normalize(raw: &str, options: &ParseOptions) -> Normalized {
    let mut out = Normalized::default();

    for (idx, segment) in split_lines(raw).enumerate() {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.non_blank += 1;

        if options.is_comment(trimmed) {
            out.comments += 1;
            continue;
        }

        out.lines.push(Line {
            text: trimmed.to_string(),
            number: idx + 1,
            depth: indent_depth(segment),
        });
    }

    out
}

/// Count leading whitespace characters.
pub fn indent_depth(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn split_lines(raw: &str) -> impl Iterator<Item = &str> {
    LineSplit { rest: Some(raw) }
}

struct LineSplit<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for LineSplit<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.find(['\r', '\n']) {
            Some(pos) => {
                let line = &rest[..pos];
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = Some(&rest[pos + skip..]);
                Some(line)
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
