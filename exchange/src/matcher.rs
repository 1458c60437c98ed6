//! Glob matching over walked paths.
//!
//! Patterns follow `globset` semantics with `*` confined to one path segment,
//! `**` spanning segments, `?`, character classes and `{a,b}` alternation. A
//! leading `!` negates a pattern. A pattern without glob characters matches
//! the path itself and everything below it.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::FsError;
use crate::fs::{resolve_within, FileSystem, WalkEntry};

/// Characters that make a path a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Whether `path` needs glob resolution rather than a direct read.
pub fn has_glob(path: &str) -> bool {
    path.starts_with('!') || path.contains(GLOB_CHARS)
}

/// Strip `./` prefixes and trailing separators so patterns line up with walk output.
pub fn normalize(path: &str) -> &str {
    let mut path = path.trim();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_end_matches('/')
}

/// Nearest ancestor directory of `pattern` that contains no glob characters.
///
/// Returns an empty string when the first segment already holds a glob.
pub fn glob_base(pattern: &str) -> String {
    let pattern = normalize(pattern.trim_start_matches('!'));
    let segments: Vec<&str> = pattern.split('/').collect();
    let literal: Vec<&str> = segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .take_while(|segment| !has_glob(segment))
        .copied()
        .collect();
    literal.join("/")
}

/// Glob expressions a single user pattern expands to.
fn expand(pattern: &str) -> Vec<String> {
    let pattern = normalize(pattern);
    if pattern.is_empty() || pattern == "." {
        return vec!["**".to_string()];
    }
    if has_glob(pattern) {
        vec![pattern.to_string()]
    } else {
        vec![pattern.to_string(), format!("{pattern}/**")]
    }
}

fn build_set<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expr in expand(pattern) {
            builder.add(GlobBuilder::new(&expr).literal_separator(true).build()?);
        }
    }
    builder.build()
}

/// Positive patterns minus negative ones.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathMatcher {
    /// Build from positive patterns (`!`-prefixed entries count as negative)
    /// plus an explicit exclusion list.
    pub fn new<'a, I, E>(patterns: I, exclude: E) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = &'a str>,
    {
        let mut positive = Vec::new();
        let mut negative: Vec<&str> = exclude.into_iter().collect();
        for pattern in patterns {
            match pattern.trim().strip_prefix('!') {
                Some(negated) => negative.push(negated),
                None => positive.push(pattern),
            }
        }

        Ok(Self {
            include: build_set(positive)?,
            exclude: build_set(negative)?,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        let path = normalize(path);
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Walk `base` (relative to `cwd`, empty for `cwd` itself) and keep the
    /// matching entries. Paths in the result are relative to `cwd`.
    pub fn find(
        &self,
        fs: &dyn FileSystem,
        cwd: &Path,
        base: &str,
        ignore: &[String],
    ) -> Result<Vec<WalkEntry>, FsError> {
        let base = normalize(base);
        let root = if base.is_empty() {
            cwd.to_path_buf()
        } else {
            resolve_within(cwd, base)?
        };

        let mut found: Vec<WalkEntry> = fs
            .walk(&root, ignore)?
            .into_iter()
            .map(|entry| match base {
                "" => entry,
                base => WalkEntry {
                    path: format!("{base}/{}", entry.path),
                    is_dir: entry.is_dir,
                },
            })
            .filter(|entry| self.is_match(&entry.path))
            .collect();
        found.sort();
        Ok(found)
    }
}

/// Matcher for ignore-list entries, applied to single path components.
pub fn ignore_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!(pattern = %pattern, error = %e, "skipping invalid ignore pattern"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignore list failed to compile, ignoring nothing");
        GlobSet::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn matcher(patterns: &[&str], exclude: &[&str]) -> PathMatcher {
        PathMatcher::new(patterns.iter().copied(), exclude.iter().copied()).unwrap()
    }

    #[test]
    fn test_has_glob() {
        assert!(has_glob("src/*.rs"));
        assert!(has_glob("src/**"));
        assert!(has_glob("{a,b}.js"));
        assert!(has_glob("!dist"));
        assert!(!has_glob("src/main.rs"));
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("src/commands/*.rs"), "src/commands");
        assert_eq!(glob_base("src/**/mod.rs"), "src");
        assert_eq!(glob_base("*.md"), "");
        assert_eq!(glob_base("./docs/{a,b}.md"), "docs");
    }

    #[test]
    fn test_star_stays_in_segment() {
        let m = matcher(&["src/*.rs"], &[]);
        assert!(m.is_match("src/lib.rs"));
        assert!(!m.is_match("src/commands/mod.rs"));
    }

    #[test]
    fn test_double_star_and_braces() {
        let m = matcher(&["src/**/*.{rs,toml}"], &[]);
        assert!(m.is_match("src/commands/mod.rs"));
        assert!(m.is_match("src/Cargo.toml"));
        assert!(!m.is_match("src/readme.md"));
    }

    #[test]
    fn test_literal_path_matches_subtree() {
        let m = matcher(&["src"], &[]);
        assert!(m.is_match("src"));
        assert!(m.is_match("src/a/b.rs"));
        assert!(!m.is_match("srcs/a.rs"));
    }

    #[test]
    fn test_dot_matches_everything() {
        let m = matcher(&["."], &[]);
        assert!(m.is_match("a.txt"));
        assert!(m.is_match("deep/nested/file"));
    }

    #[test]
    fn test_negation_and_exclusions() {
        let m = matcher(&["**/*.js", "!**/*.test.js"], &["dist/**"]);
        assert!(m.is_match("src/app.js"));
        assert!(!m.is_match("src/app.test.js"));
        assert!(!m.is_match("dist/bundle.js"));
    }

    #[test]
    fn test_ignore_set_matches_names() {
        let set = ignore_set(&[".git".to_string(), "*.pyc".to_string()]);
        assert!(set.is_match(".git"));
        assert!(set.is_match("cache.pyc"));
        assert!(!set.is_match("src"));
    }

    #[test]
    fn test_find_under_base_keeps_cwd_relative_paths() {
        let fs = MemFs::new()
            .with_file("/w/src/a.rs", "")
            .with_file("/w/src/deep/b.rs", "")
            .with_file("/w/docs/c.rs", "");

        let m = matcher(&["src/**/*.rs"], &[]);
        let found = m.find(&fs, Path::new("/w"), "src", &[]).unwrap();
        let paths: Vec<&str> = found.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(paths, vec!["src/a.rs", "src/deep/b.rs"]);
    }
}
