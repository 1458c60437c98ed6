//! Prompt packer: inlines the files a prompt's checklist names.
//!
//! Every `- [name](path)` line in the prompt is replaced by the files it
//! resolves to, each rendered as a header plus fenced block that the parser
//! decodes back into the original bytes. Everything else in the prompt passes
//! through untouched.
//!
//! The label may carry options separated by `;`:
//! - `@ls` lists the resolved paths instead of inlining their content
//! - `-pattern` excludes matches

use std::collections::HashSet;
use std::path::Path;

use base64::Engine;

use crate::checklist::{parse_item, parse_label, LabelOptions};
use crate::config::ExchangeConfig;
use crate::entry::{Encoding, PackResult};
use crate::error::ExchangeError;
use crate::fs::{resolve_within, FileSystem};
use crate::matcher::{glob_base, has_glob, normalize, PathMatcher};

/// Fence tag marking a base64 payload.
const BASE64_TAG: &str = "base64";

/// Width of base64 lines inside a `base64` fence.
const BASE64_LINE_WIDTH: usize = 76;

/// Expands checklist lines into inlined file blocks.
pub struct Packer<'a> {
    fs: &'a dyn FileSystem,
    cwd: &'a Path,
    ignore: Vec<String>,
}

impl<'a> Packer<'a> {
    pub fn new(fs: &'a dyn FileSystem, cwd: &'a Path) -> Self {
        Self {
            fs,
            cwd,
            ignore: ExchangeConfig::builtin().ignore,
        }
    }

    pub fn from_config(fs: &'a dyn FileSystem, cwd: &'a Path, config: &ExchangeConfig) -> Self {
        Self {
            fs,
            cwd,
            ignore: config.ignore.clone(),
        }
    }

    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Expand every checklist line in `prompt`.
    ///
    /// Never fails as a whole: unreadable targets become inline `ERROR:`
    /// lines and entries in [`PackResult::errors`].
    pub fn pack(&self, prompt: &str) -> PackResult {
        let mut result = PackResult::default();
        let mut seen: HashSet<String> = HashSet::new();

        for segment in prompt.split_inclusive('\n') {
            let line = segment.trim_end_matches(['\r', '\n']);
            match parse_item(line) {
                Some(item) => {
                    let options = parse_label(item.label);
                    self.expand(item.path, &options, &mut seen, &mut result);
                }
                None => result.text.push_str(segment),
            }
        }

        tracing::debug!(
            injected = result.injected.len(),
            errors = result.errors.len(),
            "packed prompt"
        );
        result
    }

    fn expand(
        &self,
        path: &str,
        options: &LabelOptions,
        seen: &mut HashSet<String>,
        result: &mut PackResult,
    ) {
        let targets = match self.resolve(path, options) {
            Ok(targets) => targets,
            Err(e) => {
                self.record_error(path, &e.to_string(), result);
                return;
            }
        };
        if targets.is_empty() {
            tracing::warn!(pattern = %path, "checklist pattern matched no files");
        }

        for target in targets {
            if !seen.insert(target.clone()) {
                continue;
            }
            if options.list_only {
                result.text.push_str(&target);
                result.text.push('\n');
                continue;
            }

            let bytes = resolve_within(self.cwd, &target).and_then(|full| self.fs.read(&full));
            match bytes {
                Ok(bytes) => {
                    result.injected.push(format!("{target} ({} bytes)", bytes.len()));
                    result.text.push_str(&render_block(&target, bytes));
                }
                Err(e) => self.record_error(&target, &e.to_string(), result),
            }
        }
    }

    /// Files (relative to `cwd`, sorted) named by one checklist path.
    fn resolve(&self, path: &str, options: &LabelOptions) -> Result<Vec<String>, ExchangeError> {
        let exclude = options.exclude.iter().map(String::as_str);

        let (matcher, base) = if has_glob(path) {
            (PathMatcher::new([path], exclude)?, glob_base(path))
        } else {
            let full = resolve_within(self.cwd, path)?;
            if !self.fs.is_dir(&full) {
                return Ok(vec![normalize(path).to_string()]);
            }
            let base = match normalize(path) {
                "." => String::new(),
                base => base.to_string(),
            };
            (PathMatcher::new([normalize(path)], exclude)?, base)
        };

        let found = matcher.find(self.fs, self.cwd, &base, &self.ignore)?;
        Ok(found
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.path)
            .collect())
    }

    fn record_error(&self, path: &str, reason: &str, result: &mut PackResult) {
        tracing::warn!(path = %path, error = %reason, "could not read file for packing");
        result
            .text
            .push_str(&format!("ERROR: Could not read file {path}: {reason}\n"));
        result.errors.push(format!("{path}: {reason}"));
    }
}

/// Header plus fenced block for one file.
///
/// UTF-8 content is fenced with the extension as language tag, and lines that
/// open or close a three-backtick fence gain a fourth backtick so the parser's
/// nested-fence rule restores them. Content the parser could not restore
/// exactly (unpaired or tagged closing fences, lines already nested, an
/// extension that reads as the `base64` tag) is fenced as `base64`, as is
/// anything that is not UTF-8.
pub fn render_block(relative: &str, bytes: Vec<u8>) -> String {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    let (lang, body) = match String::from_utf8(bytes) {
        Ok(text) => {
            let lang = fence_tag(relative);
            if Encoding::from_lang(&lang) == Encoding::Utf8 && fences_survive(&text) {
                (lang, escape_fences(&text))
            } else {
                tracing::debug!(path = %relative, "text would not survive fencing, packing as base64");
                (BASE64_TAG.to_string(), encode_base64(text.as_bytes()))
            }
        }
        Err(e) => (BASE64_TAG.to_string(), encode_base64(e.as_bytes())),
    };

    let mut block = format!("#### [{name}]({relative})\n```{lang}\n{body}");
    if !body.is_empty() && !body.ends_with('\n') {
        block.push('\n');
    }
    block.push_str("```\n");
    block
}

/// File extension as a fence tag. Extensions the parser would misread
/// (backticks, whitespace) give an untagged fence.
fn fence_tag(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    if ext.contains(|c: char| c == '`' || c.is_whitespace()) {
        String::new()
    } else {
        ext
    }
}

/// Whether every fence line in `text` comes back verbatim after
/// [`escape_fences`] and parsing: fences pair up, closers carry no tag,
/// opener tags have no surrounding whitespace, and nothing is nested already.
fn fences_survive(text: &str) -> bool {
    let mut open = false;
    for line in text.split_inclusive('\n') {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(rest) = line.strip_prefix("```") else {
            continue;
        };
        let faithful = if open {
            rest.is_empty()
        } else {
            !rest.starts_with('`') && rest.trim() == rest
        };
        if !faithful {
            return false;
        }
        open = !open;
    }
    !open
}

fn escape_fences(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.starts_with("```") && !line.starts_with("````") {
            escaped.push('`');
        }
        escaped.push_str(line);
    }
    escaped
}

fn encode_base64(bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH + 1);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
        wrapped.push_str(&String::from_utf8_lossy(chunk));
        wrapped.push('\n');
    }
    wrapped
}
