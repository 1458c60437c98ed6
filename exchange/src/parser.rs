//! Response parser: recovers file and command blocks from model output.
//!
//! A response intermixes prose with blocks of the form:
//!
//! ````text
//! #### [label](path/or/@command)
//! ```lang
//! content
//! ```
//! ````
//!
//! Parsing is one forward pass through a per-line state machine. The same
//! transition function serves complete strings, blocking readers and async
//! line streams, so buffered and streamed responses decode identically.

use std::io::BufRead;

use futures::{Stream, StreamExt};

use crate::entry::{Decoded, Encoding, FileEntry, FileError, ParsedResult};
use crate::error::Result;
use crate::validator::validate;

/// Message recorded for header lines that cannot be split into label and path.
pub const INCORRECT_HEADER: &str = "Incorrect file header";

const HEADER_PREFIX: &str = "#### [";
const FENCE: &str = "```";
const NESTED_FENCE: &str = "````";

/// Classification of a line seen while no entry is open.
#[derive(Debug, PartialEq, Eq)]
enum Header<'a> {
    Open { label: &'a str, filename: &'a str },
    Malformed,
    NotHeader,
}

fn classify_header(line: &str) -> Header<'_> {
    let Some(inner) = line
        .strip_prefix(HEADER_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return Header::NotHeader;
    };

    let parts: Vec<&str> = inner.split("](").collect();
    match parts.as_slice() {
        [label, filename] if !filename.is_empty() => Header::Open {
            label: *label,
            filename: *filename,
        },
        parts if parts.len() > 2 => Header::Malformed,
        _ => Header::NotHeader,
    }
}

/// Incremental parser state.
///
/// Feed raw lines with [`Parser::feed`], then call [`Parser::finish`]. Lines
/// may carry their `\n` / `\r\n` terminator or not. A `\r` before the
/// newline is ignored when matching headers and fences but kept in content.
#[derive(Debug, Default)]
pub struct Parser {
    /// Entry being built.
    current: Option<FileEntry>,
    /// Tag of the nested fence we are inside, if any.
    inner_type: Option<String>,
    /// 0-based index of the current entry's header line.
    started: usize,
    /// Number of lines fed so far.
    lines_seen: usize,
    decoded: Vec<Decoded>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the transition for one line.
    pub fn feed(&mut self, raw: &str) {
        let index = self.lines_seen;
        self.lines_seen += 1;

        // Matching ignores a trailing `\r`; content keeps it.
        let body = raw.strip_suffix('\n').unwrap_or(raw);
        let line = body.strip_suffix('\r').unwrap_or(body);
        let eol = &body[line.len()..];

        if self.current.is_none() {
            self.feed_outside(line, index);
            return;
        }
        let Some(entry) = self.current.as_mut() else {
            return;
        };

        if line.starts_with(NESTED_FENCE) {
            let fence = match self.inner_type.take() {
                None => {
                    let tag = line.trim_start_matches('`').trim();
                    self.inner_type = Some(tag.to_string());
                    format!("{FENCE}{tag}")
                }
                Some(_) => FENCE.to_string(),
            };
            push_line(entry, &format!("{fence}{eol}"));
        } else if self.inner_type.is_some() {
            push_line(entry, body);
        } else if line == FENCE {
            if index == self.started + 1 {
                entry.lang.clear();
                entry.encoding = Encoding::Utf8;
            } else {
                self.complete();
            }
        } else if let Some(tag) = line.strip_prefix(FENCE) {
            entry.lang = tag.trim().to_string();
            entry.encoding = Encoding::from_lang(&entry.lang);
        } else {
            push_line(entry, body);
        }
    }

    /// Transition while no entry is open: only headers matter.
    fn feed_outside(&mut self, line: &str, index: usize) {
        match classify_header(line) {
            Header::Open { label, filename } => {
                self.current = Some(FileEntry::new(label, filename));
                self.inner_type = None;
                self.started = index;
            }
            Header::Malformed => {
                tracing::warn!(line = index + 1, "malformed file header");
                self.decoded
                    .push(Err(FileError::new(INCORRECT_HEADER, line, index + 1)));
            }
            Header::NotHeader => {}
        }
    }

    fn complete(&mut self) {
        if let Some(entry) = self.current.take() {
            tracing::debug!(
                filename = %entry.filename,
                lang = %entry.lang,
                bytes = entry.content.len(),
                "decoded entry"
            );
            self.decoded.push(Ok(entry));
        }
        self.inner_type = None;
    }

    /// Decoded units so far, in document order.
    pub fn decoded(&self) -> &[Decoded] {
        &self.decoded
    }

    /// Flush any open entry and reconcile the result.
    pub fn finish(mut self) -> ParsedResult {
        if let Some(entry) = &self.current {
            tracing::debug!(
                filename = %entry.filename,
                header_line = self.started + 1,
                "flushing unterminated entry at end of input"
            );
        }
        self.complete();

        let mut correct = Vec::new();
        let mut failed = Vec::new();
        for unit in self.decoded {
            match unit {
                Ok(entry) => correct.push(entry),
                Err(error) => failed.push(error),
            }
        }

        let validation = validate(&correct);
        ParsedResult {
            correct,
            failed,
            validate: validation.validate,
            files: validation.files,
            requested: validation.requested,
            is_valid: validation.is_valid,
        }
    }
}

fn push_line(entry: &mut FileEntry, line: &str) {
    entry.content.push_str(line);
    entry.content.push('\n');
}

/// Parse a complete response.
pub fn parse(text: &str) -> ParsedResult {
    parse_lines(text.split_inclusive('\n'))
}

/// Parse from any line source.
pub fn parse_lines<I, S>(lines: I) -> ParsedResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = Parser::new();
    for line in lines {
        parser.feed(line.as_ref());
    }
    parser.finish()
}

/// Parse from a blocking reader; read errors abort the parse.
pub fn parse_reader<R: BufRead>(mut reader: R) -> Result<ParsedResult> {
    let mut parser = Parser::new();
    let mut line = String::new();
    while reader.read_line(&mut line)? > 0 {
        parser.feed(&line);
        line.clear();
    }
    Ok(parser.finish())
}

/// Parse from an async line stream, pulling one line at a time.
pub async fn parse_stream<S>(stream: S) -> Result<ParsedResult>
where
    S: Stream<Item = std::io::Result<String>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut parser = Parser::new();
    while let Some(line) = stream.next().await {
        parser.feed(&line?);
    }
    Ok(parser.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_header() {
        assert_eq!(
            classify_header("#### [test](file.js)"),
            Header::Open {
                label: "test",
                filename: "file.js"
            }
        );
        assert_eq!(
            classify_header("#### [](@rm)"),
            Header::Open {
                label: "",
                filename: "@rm"
            }
        );
        assert_eq!(classify_header("#### [a](b](c)"), Header::Malformed);
        assert_eq!(classify_header("#### [a]()"), Header::NotHeader);
        assert_eq!(classify_header("### [a](b)"), Header::NotHeader);
        assert_eq!(classify_header("#### [a](b) "), Header::NotHeader);
    }

    #[test]
    fn test_single_block() {
        let parsed = parse("Here you go:\n#### [main](src/main.rs)\n```rs\nfn main() {}\n```\nDone.\n");

        assert_eq!(parsed.correct.len(), 1);
        let entry = &parsed.correct[0];
        assert_eq!(entry.label, "main");
        assert_eq!(entry.filename, "src/main.rs");
        assert_eq!(entry.lang, "rs");
        assert_eq!(entry.content, "fn main() {}\n");
        assert!(parsed.failed.is_empty());
        assert!(!parsed.is_valid);
    }

    #[test]
    fn test_untagged_fence_opens_then_closes() {
        let parsed = parse("#### [](notes.txt)\n```\nplain\n```\n");
        assert_eq!(parsed.correct.len(), 1);
        assert_eq!(parsed.correct[0].lang, "");
        assert_eq!(parsed.correct[0].content, "plain\n");
    }

    #[test]
    fn test_nested_fence_is_literal_content() {
        let text = "#### [doc](README.md)\n```md\n# Usage\n````js\nrun()\n```\nstill inside\n````\nafter\n```\n";
        let parsed = parse(text);

        assert_eq!(parsed.correct.len(), 1);
        assert_eq!(
            parsed.correct[0].content,
            "# Usage\n```js\nrun()\n```\nstill inside\n```\nafter\n"
        );
    }

    #[test]
    fn test_unterminated_entry_is_flushed() {
        let parsed = parse("#### [a](a.txt)\n```txt\npartial line\n");
        assert_eq!(parsed.correct.len(), 1);
        assert_eq!(parsed.correct[0].content, "partial line\n");
        assert!(parsed.failed.is_empty());
    }

    #[test]
    fn test_malformed_header_records_line() {
        let parsed = parse("intro\n#### [a](b](c)\n");
        assert!(parsed.correct.is_empty());
        assert_eq!(
            parsed.failed,
            vec![FileError::new(INCORRECT_HEADER, "#### [a](b](c)", 2)]
        );
    }

    #[test]
    fn test_crlf_framing_content_kept() {
        let parsed = parse_lines(["#### [x](x.txt)\r\n", "```\r\n", "one\r\n", "```\r\n"]);
        assert_eq!(parsed.correct.len(), 1);
        assert_eq!(parsed.correct[0].filename, "x.txt");
        assert_eq!(parsed.correct[0].content, "one\r\n");
    }

    #[test]
    fn test_crlf_string_and_reader_agree() {
        let text = "#### [](w.txt)\r\n```txt\r\na\r\n````sh\r\nls\r\n````\r\n```\r\n";
        let parsed = parse(text);
        assert_eq!(parsed.correct[0].lang, "txt");
        assert_eq!(parsed.correct[0].content, "a\r\n```sh\r\nls\r\n```\r\n");
        assert_eq!(parse_reader(text.as_bytes()).unwrap(), parsed);
    }

    #[test]
    fn test_base64_fence_sets_encoding() {
        let parsed = parse("#### [](logo.png)\n```base64\niVBORw0KGgo=\n```\n");
        assert_eq!(parsed.correct[0].encoding, Encoding::Base64);
    }

    #[test]
    fn test_incremental_feed_matches_parse() {
        let text = "#### [a](a.txt)\n```\nA\n```\n#### [b](b.txt)\n```\nB\n```\n";
        let mut parser = Parser::new();
        for line in text.lines() {
            parser.feed(line);
        }
        assert_eq!(parser.decoded().len(), 2);
        assert_eq!(parser.finish(), parse(text));
    }
}
