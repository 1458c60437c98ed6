//! Fenced File Exchange Library
//!
//! This library implements the textual protocol that lets a model response
//! drive file and process changes in a working directory:
//! - Packing: expand `- [name](path)` checklist lines in a prompt into
//!   inlined, fenced file contents
//! - Parsing: decode `#### [label](filename)` blocks out of free-form
//!   response text, recovering from malformed headers
//! - Validation: reconcile the response's `@validate` manifest against what
//!   was actually delivered
//! - Unpacking: write files and dispatch `@command` blocks in document order
//!
//! # Usage
//!
//! ```rust,ignore
//! use exchange::{parse, OsFs, Unpacker};
//!
//! let parsed = parse(&response_text);
//! let fs = OsFs::new();
//! for line in Unpacker::new(&fs, &cwd).dry_run(true).unpack(&parsed) {
//!     println!("{line}");
//! }
//! ```

pub mod checklist;
pub mod commands;
pub mod config;
pub mod entry;
pub mod error;
pub mod fs;
pub mod matcher;
pub mod packer;
pub mod parser;
pub mod unpacker;
pub mod validator;

// Re-export key entry types
pub use entry::{Decoded, Encoding, FileEntry, FileError, Manifest, PackResult, ParsedResult};

// Re-export error types
pub use error::{ExchangeError, FsError, RegistryError, Result};

// Re-export filesystem capability
pub use fs::{FileSystem, MemFs, OsFs, WalkEntry};

// Re-export protocol stages
pub use commands::{Command, CommandContext, CommandRegistry, Dispatch, Lines};
pub use config::ExchangeConfig;
pub use packer::Packer;
pub use parser::{parse, parse_lines, parse_reader, parse_stream, Parser};
pub use unpacker::Unpacker;
pub use validator::{validate, Validation};
