//! `@bash`: turn shell lines into transcript-redirected commands.
//!
//! Nothing is executed here. Each line is rewritten so that, when the host
//! runs it, stdout and stderr append to the transcript file.

use super::{Command, CommandContext, Lines};

pub const HELP: &str = "Shell commands, one per line, appended to the transcript when run";

/// Characters that force the transcript path to be quoted.
const NEEDS_QUOTING: &[char] = &[
    ' ', '\t', ';', '|', '&', '`', '$', '(', ')', '<', '>', '"', '\'', '\\', '*', '?', '#', '~',
];

/// Single-quote `arg` for a POSIX shell when it contains metacharacters.
///
/// Embedded single quotes use the `'\''` pattern (end quote, escaped quote,
/// start quote).
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(NEEDS_QUOTING) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

struct Bash<'a> {
    ctx: CommandContext<'a>,
}

pub fn build<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
    Box::new(Bash { ctx })
}

impl<'a> Command<'a> for Bash<'a> {
    fn lines(self: Box<Self>) -> Lines<'a> {
        let entry = self.ctx.entry;
        let transcript = shell_quote(&self.ctx.config.transcript.to_string_lossy());
        Box::new(
            entry
                .argument_lines()
                .map(move |cmd| format!("{cmd} >> {transcript} 2>&1")),
        )
    }
}
