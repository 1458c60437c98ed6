//! `@validate`: report how the response's manifest compares to its content.
//!
//! The header label carries self-reported counts (`2 file(s), 1 command(s)`)
//! which are checked against the actual entries first; then the set-equality
//! outcome is reported file by file.

use std::sync::LazyLock;

use regex::Regex;

use crate::entry::ParsedResult;

use super::{Command, CommandContext, Lines};

pub const HELP: &str = "Checklist of every delivered filename; label gives `N file(s), M command(s)`";

static FILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*files?\b").expect("FILES_RE regex should compile")
});

static COMMANDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*commands?\b").expect("COMMANDS_RE regex should compile")
});

/// File and command counts, declared or observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub files: usize,
    pub commands: usize,
}

impl std::fmt::Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} file(s), {} command(s)", self.files, self.commands)
    }
}

fn capture_count(re: &Regex, label: &str) -> usize {
    re.captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Counts declared by a header label. A missing clause counts as zero.
pub fn declared_counts(label: &str) -> Counts {
    Counts {
        files: capture_count(&FILES_RE, label),
        commands: capture_count(&COMMANDS_RE, label),
    }
}

/// Counts actually present, not counting the manifest itself.
pub fn actual_counts(parsed: &ParsedResult) -> Counts {
    Counts {
        files: parsed.file_entries().count(),
        commands: parsed.command_entries().count(),
    }
}

struct Validate<'a> {
    ctx: CommandContext<'a>,
}

pub fn build<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Validate { ctx })
}

impl<'a> Command<'a> for Validate<'a> {
    fn lines(self: Box<Self>) -> Lines<'a> {
        Box::new(report(&self.ctx.entry.label, self.ctx.parsed).into_iter())
    }
}

fn report(label: &str, parsed: &ParsedResult) -> Vec<String> {
    let mut lines = Vec::new();

    let declared = declared_counts(label);
    let actual = actual_counts(parsed);
    if declared != actual {
        tracing::warn!(%declared, %actual, "manifest header counts disagree");
        lines.push(format!(
            "Warning: header declares {declared} but the response contains {actual}"
        ));
    }

    if parsed.is_valid {
        lines.push(format!(
            "Validation passed: {} file(s) match the manifest",
            parsed.requested.len()
        ));
    } else {
        lines.push("Validation failed: manifest does not match delivered files".to_string());
    }

    for filename in parsed.requested.keys() {
        if parsed.files.contains(filename) {
            lines.push(format!("  ✓ {filename}"));
        } else {
            lines.push(format!("  ✗ {filename} (declared, not delivered)"));
        }
    }
    for filename in parsed.files.keys() {
        if !parsed.requested.contains(filename) {
            lines.push(format!("  ✗ {filename} (delivered, not declared)"));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::run_builtin;
    use crate::fs::MemFs;
    use crate::parser::parse;
    use std::path::Path;

    fn run(text: &str) -> Vec<String> {
        let parsed = parse(text);
        let entry = parsed.validate.clone().expect("response has a manifest");
        run_builtin(&entry, &parsed, &MemFs::new(), Path::new("/w"))
    }

    #[test]
    fn test_declared_counts() {
        assert_eq!(
            declared_counts("2 file(s), 1 command(s)"),
            Counts {
                files: 2,
                commands: 1
            }
        );
        assert_eq!(
            declared_counts("1 command(s)"),
            Counts {
                files: 0,
                commands: 1
            }
        );
        assert_eq!(declared_counts("3 files"), Counts { files: 3, commands: 0 });
        assert_eq!(declared_counts(""), Counts::default());
    }

    #[test]
    fn test_passing_manifest() {
        let lines = run(
            "#### [test](file.js)\n```js\nconsole.info(1)\n```\n#### [1 file(s)](@validate)\n```md\n- [test](file.js)\n```\n",
        );
        assert_eq!(
            lines,
            vec!["Validation passed: 1 file(s) match the manifest", "  ✓ file.js"]
        );
    }

    #[test]
    fn test_count_mismatch_and_missing_file() {
        let lines = run(
            "#### [](a.js)\n```js\na\n```\n#### [](@rm)\n```\nold.js\n```\n#### [3 file(s)](@validate)\n```md\n- [](a.js)\n- [](b.js)\n```\n",
        );
        assert_eq!(
            lines,
            vec![
                "Warning: header declares 3 file(s), 0 command(s) but the response contains 1 file(s), 1 command(s)",
                "Validation failed: manifest does not match delivered files",
                "  ✓ a.js",
                "  ✗ b.js (declared, not delivered)",
                "  ✗ @rm (delivered, not declared)",
            ]
        );
    }
}
