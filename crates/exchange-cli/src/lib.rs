//! Command-line front end for the exchange protocol.
//!
//! ```bash
//! # Inline the files a prompt's checklist names
//! exchange pack prompt.md > packed.md
//!
//! # Inspect what a response would do
//! exchange parse response.md
//!
//! # Preview, confirm, then apply
//! exchange unpack response.md
//!
//! # Apply without asking
//! EXCHANGE_IGNORE=.git,dist exchange unpack response.md --yes
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use exchange::{ExchangeConfig, FileSystem, Packer, ParsedResult, Unpacker};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{info, warn};

/// Reads from stdin when given as the input path.
pub const STDIN: &str = "-";

/// Command-line arguments
#[derive(ClapParser, Debug)]
#[command(name = "exchange", version, about = "Fenced file exchange between prompts and a working directory")]
pub struct Args {
    /// Working directory all paths resolve against (default: current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Names skipped while walking directories (overrides EXCHANGE_IGNORE)
    #[arg(long, global = true, value_delimiter = ',')]
    pub ignore: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Expand checklist lines in a prompt into inlined file blocks
    Pack {
        /// Prompt file, or `-` for stdin
        input: String,
    },

    /// Decode a response and print a JSON summary of its entries
    Parse {
        /// Response file, or `-` for stdin
        input: String,
    },

    /// Write files and run commands from a response
    Unpack {
        /// Response file, or `-` for stdin
        input: String,
        /// Only log what would be written (overrides EXCHANGE_DRY_RUN)
        #[arg(long)]
        dry_run: bool,
        /// Apply without the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

impl Args {
    /// Environment config with command-line overrides applied.
    pub fn config(&self) -> ExchangeConfig {
        let config = ExchangeConfig::default();
        if self.ignore.is_empty() {
            config
        } else {
            config.with_ignore(self.ignore.clone())
        }
    }

    pub fn working_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir().context("cannot determine current directory"),
        }
    }
}

/// Whole input as text.
pub async fn read_input(input: &str) -> Result<String> {
    if input == STDIN {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {input}"))
}

/// Parse a response one line at a time as it arrives.
///
/// Lines keep their terminators so `\r\n` content survives.
pub async fn parse_async<R>(reader: R) -> Result<ParsedResult>
where
    R: AsyncBufRead + Unpin,
{
    let lines = futures::stream::unfold(reader, |mut reader| async move {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(line), reader)),
            Err(e) => Some((Err(e), reader)),
        }
    });
    exchange::parse_stream(lines)
        .await
        .context("failed to read response")
}

pub async fn parse_input(input: &str) -> Result<ParsedResult> {
    if input == STDIN {
        return parse_async(BufReader::new(tokio::io::stdin())).await;
    }
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("failed to open {input}"))?;
    parse_async(BufReader::new(file)).await
}

/// What `exchange parse` prints.
#[derive(Debug, Serialize)]
pub struct ParseSummary<'a> {
    pub entries: Vec<&'a str>,
    pub failed: &'a [exchange::FileError],
    pub files: &'a exchange::Manifest,
    pub requested: &'a exchange::Manifest,
    pub is_valid: bool,
    pub has_manifest: bool,
}

impl<'a> ParseSummary<'a> {
    pub fn new(parsed: &'a ParsedResult) -> Self {
        Self {
            entries: parsed.correct.iter().map(|e| e.filename.as_str()).collect(),
            failed: &parsed.failed,
            files: &parsed.files,
            requested: &parsed.requested,
            is_valid: parsed.is_valid,
            has_manifest: parsed.validate.is_some(),
        }
    }
}

/// Pack `prompt` and write the expanded text to `out`.
pub fn run_pack(
    fs: &dyn FileSystem,
    cwd: &Path,
    config: &ExchangeConfig,
    prompt: &str,
    out: &mut impl Write,
) -> Result<exchange::PackResult> {
    let result = Packer::from_config(fs, cwd, config).pack(prompt);
    out.write_all(result.text.as_bytes())?;
    for injected in &result.injected {
        info!(file = %injected, "injected");
    }
    for error in &result.errors {
        warn!(error = %error, "not injected");
    }
    Ok(result)
}

pub fn run_parse(parsed: &ParsedResult, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &ParseSummary::new(parsed))?;
    writeln!(out)?;
    Ok(())
}

/// Drain an unpack pass into `out`, returning the number of lines written.
pub fn drain(unpacker: &Unpacker<'_>, parsed: &ParsedResult, out: &mut impl Write) -> Result<usize> {
    let mut count = 0;
    for line in unpacker.unpack(parsed) {
        writeln!(out, "{line}")?;
        count += 1;
    }
    Ok(count)
}

/// Ask `Apply changes? [y/N]` and read one answer. Anything but `y`/`yes`
/// declines.
pub fn confirm(input: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    write!(out, "Apply changes? [y/N] ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// How an unpack run should proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackMode {
    /// Preview only.
    DryRun,
    /// Apply immediately.
    Apply,
    /// Preview, ask, then apply on consent.
    Confirm,
}

impl UnpackMode {
    pub fn from_flags(dry_run: bool, yes: bool) -> Self {
        match (dry_run, yes) {
            (true, _) => Self::DryRun,
            (false, true) => Self::Apply,
            (false, false) => Self::Confirm,
        }
    }
}

/// Run an unpack in `mode`. Returns whether changes were applied.
pub fn run_unpack(
    fs: &dyn FileSystem,
    cwd: &Path,
    config: &ExchangeConfig,
    parsed: &ParsedResult,
    mode: UnpackMode,
    answer: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<bool> {
    let preview = Unpacker::from_config(fs, cwd, config.clone()).dry_run(true);
    let apply = Unpacker::from_config(fs, cwd, config.clone()).dry_run(false);

    match mode {
        UnpackMode::DryRun => {
            drain(&preview, parsed, out)?;
            Ok(false)
        }
        UnpackMode::Apply => {
            drain(&apply, parsed, out)?;
            Ok(true)
        }
        UnpackMode::Confirm => {
            drain(&preview, parsed, out)?;
            if !confirm(answer, out)? {
                writeln!(out, "Aborted, nothing written")?;
                return Ok(false);
            }
            drain(&apply, parsed, out)?;
            Ok(true)
        }
    }
}

/// Entry point shared by the binary.
pub async fn run(args: Args) -> Result<()> {
    let config = args.config();
    let cwd = args.working_dir()?;
    let fs = exchange::OsFs::new();
    let mut stdout = std::io::stdout().lock();

    match &args.command {
        Commands::Pack { input } => {
            let prompt = read_input(input).await?;
            let result = run_pack(&fs, &cwd, &config, &prompt, &mut stdout)?;
            info!(
                injected = result.injected.len(),
                errors = result.errors.len(),
                "pack complete"
            );
        }
        Commands::Parse { input } => {
            let parsed = parse_input(input).await?;
            run_parse(&parsed, &mut stdout)?;
        }
        Commands::Unpack {
            input,
            dry_run,
            yes,
        } => {
            let mode = UnpackMode::from_flags(*dry_run || config.dry_run, *yes);
            if mode == UnpackMode::Confirm && input == STDIN {
                bail!("response read from stdin; pass --yes or --dry-run");
            }
            let parsed = parse_input(input).await?;
            info!(cwd = %cwd.display(), ?mode, "unpacking");
            let mut answer = std::io::stdin().lock();
            run_unpack(&fs, &cwd, &config, &parsed, mode, &mut answer, &mut stdout)?;
        }
    }
    Ok(())
}
