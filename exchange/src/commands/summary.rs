//! `@summary`: echo a free-text summary.

use super::{Command, CommandContext, Lines};

pub const HELP: &str = "Free-text summary of the changes";

struct Summary<'a> {
    ctx: CommandContext<'a>,
}

pub fn build<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Summary { ctx })
}

impl<'a> Command<'a> for Summary<'a> {
    fn lines(self: Box<Self>) -> Lines<'a> {
        let entry = self.ctx.entry;
        if entry.is_blank() {
            return Box::new(std::iter::once("Empty summary".to_string()));
        }
        Box::new(
            std::iter::once("Summary:".to_string())
                .chain(entry.content.trim_end().lines().map(|line| line.trim_end().to_string())),
        )
    }
}
