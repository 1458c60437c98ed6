//! Command registry and dispatch.
//!
//! An entry whose filename starts with `@` is a command, never a path. The
//! registry maps the name after `@` to a constructor; the constructed command
//! yields its log lines lazily, performing side effects as lines are pulled.
//! A caller that stops pulling leaves the remaining work undone.

pub mod bash;
pub mod listing;
pub mod rm;
pub mod summary;
pub mod validate;

use std::path::Path;

use crate::config::ExchangeConfig;
use crate::entry::{FileEntry, ParsedResult};
use crate::error::RegistryError;
use crate::fs::FileSystem;

/// Lazy, finite, non-restartable sequence of log lines.
pub type Lines<'a> = Box<dyn Iterator<Item = String> + 'a>;

/// Everything a command may look at while running.
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    /// The entry that triggered the command.
    pub entry: &'a FileEntry,
    /// The whole response, for commands that need cross-entry context.
    pub parsed: &'a ParsedResult,
    /// Working directory all relative paths resolve against.
    pub cwd: &'a Path,
    pub fs: &'a dyn FileSystem,
    pub config: &'a ExchangeConfig,
}

/// A constructed command, ready to be drained.
pub trait Command<'a> {
    /// Consume the command into its output lines.
    fn lines(self: Box<Self>) -> Lines<'a>;
}

/// Constructor stored in the registry.
pub type Constructor = for<'a> fn(CommandContext<'a>) -> Box<dyn Command<'a> + 'a>;

/// One registered command.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub help: String,
    pub build: Constructor,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Result of looking a command up.
pub enum Dispatch<'a> {
    Known(Box<dyn Command<'a> + 'a>),
    /// Unrecognized name, carrying the catalogue to report.
    Unknown { name: String, catalogue: Vec<String> },
}

impl<'a> Dispatch<'a> {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn lines(self) -> Lines<'a> {
        match self {
            Self::Known(command) => command.lines(),
            Self::Unknown { name, catalogue } => Box::new(
                std::iter::once(format!("Unknown command: @{name}. Available commands:"))
                    .chain(catalogue),
            ),
        }
    }
}

/// Name → constructor table, in registration order.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in commands: `bash`, `get`, `ls`, `rm`, `summary`, `validate`.
    pub fn builtin() -> Self {
        let builtins: [(&str, &str, Constructor); 6] = [
            ("bash", bash::HELP, bash::build),
            ("get", listing::GET_HELP, listing::build_get),
            ("ls", listing::LS_HELP, listing::build_ls),
            ("rm", rm::HELP, rm::build),
            ("summary", summary::HELP, summary::build),
            ("validate", validate::HELP, validate::build),
        ];
        Self {
            specs: builtins
                .into_iter()
                .map(|(name, help, build)| CommandSpec {
                    name: name.to_string(),
                    help: help.to_string(),
                    build,
                })
                .collect(),
        }
    }

    /// Add a command. Names are given without `@` and must be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        build: Constructor,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if name.is_empty() || name.starts_with('@') || name.contains(char::is_whitespace) {
            return Err(RegistryError::InvalidName { name });
        }
        if self.get(&name).is_some() {
            return Err(RegistryError::Duplicate { name });
        }
        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            build,
        });
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    /// One `  @name - help` line per registered command.
    pub fn catalogue(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| format!("  @{} - {}", spec.name, spec.help))
            .collect()
    }

    /// Resolve the command named by `ctx.entry`.
    pub fn dispatch<'a>(&self, ctx: CommandContext<'a>) -> Dispatch<'a> {
        let name = ctx
            .entry
            .command_name()
            .unwrap_or(ctx.entry.filename.as_str());

        match self.get(name) {
            Some(spec) => {
                tracing::debug!(command = %name, "dispatching command");
                Dispatch::Known((spec.build)(ctx))
            }
            None => {
                tracing::warn!(command = %name, "unknown command");
                Dispatch::Unknown {
                    name: name.to_string(),
                    catalogue: self.catalogue(),
                }
            }
        }
    }
}

/// Run `entry` through the built-in registry with default config.
#[cfg(test)]
pub(crate) fn run_builtin(
    entry: &FileEntry,
    parsed: &ParsedResult,
    fs: &dyn FileSystem,
    cwd: &Path,
) -> Vec<String> {
    let config = ExchangeConfig::builtin();
    let ctx = CommandContext {
        entry,
        parsed,
        cwd,
        fs,
        config: &config,
    };
    let lines: Vec<String> = CommandRegistry::builtin().dispatch(ctx).lines().collect();
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    struct Echo<'a> {
        ctx: CommandContext<'a>,
    }

    impl<'a> Command<'a> for Echo<'a> {
        fn lines(self: Box<Self>) -> Lines<'a> {
            let entry = self.ctx.entry;
            Box::new(entry.argument_lines().map(|l| format!("echo: {l}")))
        }
    }

    fn build_echo<'a>(ctx: CommandContext<'a>) -> Box<dyn Command<'a> + 'a> {
        Box::new(Echo { ctx })
    }

    fn run(registry: &CommandRegistry, entry: &FileEntry) -> Vec<String> {
        let parsed = ParsedResult::default();
        let fs = MemFs::new();
        let config = ExchangeConfig::builtin();
        let ctx = CommandContext {
            entry,
            parsed: &parsed,
            cwd: Path::new("/w"),
            fs: &fs,
            config: &config,
        };
        let lines: Vec<String> = registry.dispatch(ctx).lines().collect();
        lines
    }

    #[test]
    fn test_builtin_names() {
        let registry = CommandRegistry::builtin();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["bash", "get", "ls", "rm", "summary", "validate"]
        );
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_names() {
        let mut registry = CommandRegistry::builtin();
        assert_eq!(
            registry.register("rm", "again", build_echo).unwrap_err(),
            RegistryError::Duplicate {
                name: "rm".to_string()
            }
        );
        assert!(matches!(
            registry.register("@echo", "", build_echo),
            Err(RegistryError::InvalidName { .. })
        ));
        assert!(registry.register("echo", "Repeat lines", build_echo).is_ok());
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn test_custom_command_dispatch() {
        let mut registry = CommandRegistry::empty();
        registry.register("echo", "Repeat lines", build_echo).unwrap();

        let entry = FileEntry::new("", "@echo").with_content("", "hi\nthere\n");
        assert_eq!(run(&registry, &entry), vec!["echo: hi", "echo: there"]);
    }

    #[test]
    fn test_unknown_command_lists_catalogue() {
        let registry = CommandRegistry::builtin();
        let entry = FileEntry::new("", "@frobnicate");
        let lines = run(&registry, &entry);

        assert_eq!(lines[0], "Unknown command: @frobnicate. Available commands:");
        assert_eq!(lines.len(), 1 + 6);
        assert!(lines[1].starts_with("  @bash - "));
        assert!(lines[6].starts_with("  @validate - "));
    }
}
