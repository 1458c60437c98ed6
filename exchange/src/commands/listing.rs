//! `@get` and `@ls`: enumerate the working directory.
//!
//! Both take one pattern per line and walk the working directory with the
//! configured ignore list. `@get` answers with checklist lines the model can
//! paste back into a prompt; `@ls` with bare file paths.

use crate::checklist::{format_item, parse_label};
use crate::matcher::PathMatcher;

use super::{Command, CommandContext, Lines};

pub const GET_HELP: &str =
    "Glob patterns, one per line; emits a checklist of matches (label may add ;-exclusions)";
pub const LS_HELP: &str = "Glob patterns, one per line (default .); emits matching file paths";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Get,
    Ls,
}

struct Listing<'a> {
    ctx: CommandContext<'a>,
    mode: Mode,
}

pub fn build_get<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Listing {
        ctx,
        mode: Mode::Get,
    })
}

pub fn build_ls<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Listing {
        ctx,
        mode: Mode::Ls,
    })
}

impl<'a> Command<'a> for Listing<'a> {
    fn lines(self: Box<Self>) -> Lines<'a> {
        let Listing { ctx, mode } = *self;
        // The walk runs on the first pull.
        Box::new(std::iter::once_with(move || collect(ctx, mode)).flatten())
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn collect(ctx: CommandContext<'_>, mode: Mode) -> Vec<String> {
    let mut patterns: Vec<&str> = ctx.entry.argument_lines().collect();
    if patterns.is_empty() {
        patterns.push(".");
    }
    let exclude = match mode {
        Mode::Get => parse_label(&ctx.entry.label).exclude,
        Mode::Ls => Vec::new(),
    };

    let matcher = match PathMatcher::new(
        patterns.iter().copied(),
        exclude.iter().map(String::as_str),
    ) {
        Ok(m) => m,
        Err(e) => return vec![format!("Invalid pattern: {e}")],
    };

    let found = match matcher.find(ctx.fs, ctx.cwd, "", &ctx.config.ignore) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(cwd = %ctx.cwd.display(), error = %e, "listing failed");
            return vec![format!("Failed to list {}: {e}", ctx.cwd.display())];
        }
    };

    let lines: Vec<String> = match mode {
        Mode::Get => found
            .iter()
            .map(|entry| format_item(basename(&entry.path), &entry.display()))
            .collect(),
        Mode::Ls => found
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.path.clone())
            .collect(),
    };

    if lines.is_empty() {
        vec![format!("No matches for {}", patterns.join(", "))]
    } else {
        lines
    }
}
