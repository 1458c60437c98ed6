//! `@rm`: delete paths, one per line.
//!
//! Each pulled line performs at most one deletion. Missing paths are
//! reported, not treated as failures, and a failure on one path never stops
//! the rest. In dry-run mode nothing is deleted.

use crate::fs::resolve_within;

use super::{Command, CommandContext, Lines};

pub const HELP: &str = "Paths to delete, one per line";

struct Remove<'a> {
    ctx: CommandContext<'a>,
}

pub fn build<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Remove { ctx })
}

impl<'a> Command<'a> for Remove<'a> {
    fn lines(self: Box<Self>) -> Lines<'a> {
        let ctx = self.ctx;
        if ctx.entry.is_blank() {
            return Box::new(std::iter::once("Nothing to remove".to_string()));
        }
        Box::new(
            ctx.entry
                .argument_lines()
                .map(move |path| remove_one(ctx, path)),
        )
    }
}

fn remove_one(ctx: CommandContext<'_>, path: &str) -> String {
    let target = match resolve_within(ctx.cwd, path) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!(path = %path, "refusing to remove path outside working directory");
            return format!("Refusing to remove {path}: {e}");
        }
    };

    if ctx.config.dry_run {
        return if ctx.fs.exists(&target) {
            format!("Would remove {path}")
        } else {
            format!("Not found: {path}")
        };
    }

    match ctx.fs.remove(&target) {
        Ok(()) => {
            tracing::info!(path = %path, "removed");
            format!("Removed {path}")
        }
        Err(e) if e.is_not_found() => format!("Not found: {path}"),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "remove failed");
            format!("Failed to remove {path}: {e}")
        }
    }
}
