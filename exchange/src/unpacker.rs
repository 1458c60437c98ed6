//! Applies a parsed response to the working directory.
//!
//! Entries run strictly in document order and each one is drained before the
//! next starts, so a `@rm` followed by a write to the same path behaves as
//! written. Output is a lazy stream of log lines: nothing is written or
//! deleted until the corresponding line is pulled.

use std::path::Path;

use crate::commands::{CommandContext, CommandRegistry, Lines};
use crate::config::ExchangeConfig;
use crate::entry::{FileEntry, FileError, ParsedResult};
use crate::fs::{resolve_within, FileSystem};

/// Drives a [`ParsedResult`] to completion against a filesystem.
pub struct Unpacker<'a> {
    fs: &'a dyn FileSystem,
    cwd: &'a Path,
    config: ExchangeConfig,
    registry: CommandRegistry,
}

impl<'a> Unpacker<'a> {
    /// Built-in commands and built-in config, ignoring the environment.
    pub fn new(fs: &'a dyn FileSystem, cwd: &'a Path) -> Self {
        Self::from_config(fs, cwd, ExchangeConfig::builtin())
    }

    pub fn from_config(fs: &'a dyn FileSystem, cwd: &'a Path, config: ExchangeConfig) -> Self {
        Self {
            fs,
            cwd,
            config,
            registry: CommandRegistry::builtin(),
        }
    }

    /// Preview mode: log what would be written without touching files.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Log lines for every entry in `parsed`, then the parse error report.
    pub fn unpack<'p>(&'p self, parsed: &'p ParsedResult) -> Lines<'p> {
        tracing::info!(
            entries = parsed.correct.len(),
            failed = parsed.failed.len(),
            dry_run = self.config.dry_run,
            "unpacking response"
        );
        let entries = parsed
            .correct
            .iter()
            .flat_map(move |entry| self.entry_lines(entry, parsed));
        let report = std::iter::once_with(move || error_report(&parsed.failed)).flatten();
        Box::new(entries.chain(report))
    }

    fn entry_lines<'p>(&'p self, entry: &'p FileEntry, parsed: &'p ParsedResult) -> Lines<'p> {
        if let Some(name) = entry.command_name() {
            let ctx = CommandContext {
                entry,
                parsed,
                cwd: self.cwd,
                fs: self.fs,
                config: &self.config,
            };
            let header = std::iter::once(format!("@{name}"));
            return Box::new(header.chain(self.registry.dispatch(ctx).lines()));
        }
        Box::new(std::iter::once(self.write_entry(entry)))
    }

    fn write_entry(&self, entry: &FileEntry) -> String {
        let filename = &entry.filename;
        if entry.is_blank() {
            tracing::warn!(file = %filename, "skipping empty file");
            return format!("Warning: {filename} is empty — use @rm to delete");
        }

        let target = match resolve_within(self.cwd, filename) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(file = %filename, "refusing to write outside working directory");
                return format!("Refusing to write {filename}: {e}");
            }
        };
        let bytes = match entry.bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "undecodable payload");
                return format!("Failed to decode {filename}: {e}");
            }
        };

        if self.config.dry_run {
            return format!("[dry-run] {filename} ({} bytes)", bytes.len());
        }
        match self.fs.write(&target, &bytes) {
            Ok(()) => {
                tracing::info!(file = %filename, bytes = bytes.len(), "wrote file");
                format!("[write] {filename} ({} bytes)", bytes.len())
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "write failed");
                format!("Failed to write {filename}: {e}")
            }
        }
    }
}

/// Parse failures grouped by message, first appearance first.
///
/// ```text
/// Incorrect file header:
///    3: #### [a](b](c)
///   12: #### [x](y](z)
/// ```
pub fn error_report(failed: &[FileError]) -> Vec<String> {
    let mut groups: Vec<(&str, Vec<&FileError>)> = Vec::new();
    for error in failed {
        match groups.iter_mut().find(|(message, _)| *message == error.error) {
            Some((_, members)) => members.push(error),
            None => groups.push((error.error.as_str(), vec![error])),
        }
    }

    let width = failed
        .iter()
        .map(|e| e.line.to_string().len())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    for (message, members) in groups {
        lines.push(format!("{message}:"));
        for error in members {
            lines.push(format!("  {:>width$}: {}", error.line, error.content));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run(fs: &MemFs, text: &str, dry_run: bool) -> Vec<String> {
        let parsed = parse(text);
        let unpacker = Unpacker::new(fs, Path::new("/w")).dry_run(dry_run);
        let lines: Vec<String> = unpacker.unpack(&parsed).collect();
        lines
    }

    #[test]
    fn test_writes_files_in_order() {
        let fs = MemFs::new();
        let lines = run(
            &fs,
            "#### [](src/a.rs)\n```rs\nfn a() {}\n```\n#### [](b.txt)\n```\nhello\n```\n",
            false,
        );

        assert_eq!(lines, vec!["[write] src/a.rs (10 bytes)", "[write] b.txt (6 bytes)"]);
        assert_eq!(fs.read_string("/w/src/a.rs").as_deref(), Some("fn a() {}\n"));
        assert_eq!(fs.read_string("/w/b.txt").as_deref(), Some("hello\n"));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fs = MemFs::new();
        let lines = run(&fs, "#### [](a.txt)\n```\nx\n```\n", true);
        assert_eq!(lines, vec!["[dry-run] a.txt (2 bytes)"]);
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_blank_content_is_not_written() {
        let fs = MemFs::new();
        let lines = run(&fs, "#### [](a.txt)\n```\n\n```\n", false);
        assert_eq!(lines, vec!["Warning: a.txt is empty — use @rm to delete"]);
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_escape_is_refused() {
        let fs = MemFs::new();
        let lines = run(&fs, "#### [](../etc/passwd)\n```\nroot\n```\n", false);
        assert!(lines[0].starts_with("Refusing to write ../etc/passwd"), "{}", lines[0]);
        assert_eq!(fs.file_count(), 0);
    }

    #[test]
    fn test_base64_entry_is_decoded() {
        let fs = MemFs::new();
        run(&fs, "#### [](logo.bin)\n```base64\niVBO\nR/8=\n```\n", false);
        assert_eq!(
            fs.read(Path::new("/w/logo.bin")).unwrap(),
            vec![0x89, 0x50, 0x4e, 0x47, 0xff]
        );
    }

    #[test]
    fn test_rm_then_write_same_path() {
        let fs = MemFs::new().with_file("/w/a.txt", "old\n");
        let lines = run(
            &fs,
            "#### [](@rm)\n```\na.txt\n```\n#### [](a.txt)\n```\nnew\n```\n",
            false,
        );
        assert_eq!(lines, vec!["@rm", "Removed a.txt", "[write] a.txt (4 bytes)"]);
        assert_eq!(fs.read_string("/w/a.txt").as_deref(), Some("new\n"));
    }

    #[test]
    fn test_stopping_early_leaves_work_undone() {
        let fs = MemFs::new()
            .with_file("/w/a.txt", "")
            .with_file("/w/b.txt", "");
        let parsed = parse("#### [](@rm)\n```\na.txt\nb.txt\n```\n");
        let unpacker = Unpacker::new(&fs, Path::new("/w"));

        let first_two: Vec<String> = unpacker.unpack(&parsed).take(2).collect();
        assert_eq!(first_two, vec!["@rm", "Removed a.txt"]);
        assert!(fs.exists(Path::new("/w/b.txt")));
    }

    #[test]
    fn test_custom_registry() {
        let fs = MemFs::new();
        let parsed = parse("#### [](@ls)\n```\n```\n");
        let unpacker = Unpacker::new(&fs, Path::new("/w")).registry(CommandRegistry::empty());

        let lines: Vec<String> = unpacker.unpack(&parsed).collect();
        assert_eq!(lines, vec!["@ls", "Unknown command: @ls. Available commands:"]);
    }

    #[test]
    fn test_error_report_groups_and_aligns() {
        let failed = vec![
            FileError::new("Incorrect file header", "#### [a](b](c)", 3),
            FileError::new("Other", "???", 7),
            FileError::new("Incorrect file header", "#### [x](y](z)", 12),
        ];
        assert_eq!(
            error_report(&failed),
            vec![
                "Incorrect file header:",
                "   3: #### [a](b](c)",
                "  12: #### [x](y](z)",
                "Other:",
                "   7: ???",
            ]
        );
    }

    #[test]
    fn test_parse_errors_follow_entries() {
        let fs = MemFs::new();
        let lines = run(&fs, "#### [](a.txt)\n```\nx\n```\n#### [a](b](c)\n", false);
        assert_eq!(
            lines,
            vec!["[write] a.txt (2 bytes)", "Incorrect file header:", "  5: #### [a](b](c)"]
        );
    }
}
