//! Checklist line grammar: `- [label](path)`.
//!
//! Shared by the packer (outgoing prompt) and the validator (`@validate`
//! body), so both sides of the exchange agree on what a checklist line is.

/// A parsed `- [label](path)` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem<'a> {
    pub label: &'a str,
    pub path: &'a str,
}

/// Options embedded in a packer label: `@ls;-*.lock;-dist/**`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelOptions {
    /// `@ls` marker: list paths instead of inlining content.
    pub list_only: bool,
    /// `-pattern` exclusions, without the leading `-`.
    pub exclude: Vec<String>,
    /// Whatever remains once markers and exclusions are removed.
    pub name: String,
}

/// Parse a checklist line. Lines that do not fit the grammar yield `None`,
/// as do lines with a second `](`, matching file headers.
pub fn parse_item(line: &str) -> Option<ChecklistItem<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let inner = line.strip_prefix("- [")?.strip_suffix(')')?;
    let (label, path) = inner.split_once("](")?;
    if path.is_empty() || path.contains("](") {
        return None;
    }
    Some(ChecklistItem { label, path })
}

/// Render a checklist line.
pub fn format_item(label: &str, path: &str) -> String {
    format!("- [{label}]({path})")
}

/// Split a packer/`@get` label into its marker, exclusions and display name.
pub fn parse_label(label: &str) -> LabelOptions {
    let mut options = LabelOptions::default();
    let mut name_parts = Vec::new();

    for part in label.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if part == "@ls" {
            options.list_only = true;
        } else if let Some(pattern) = part.strip_prefix('-') {
            if !pattern.is_empty() {
                options.exclude.push(pattern.to_string());
            }
        } else {
            name_parts.push(part);
        }
    }

    options.name = name_parts.join(";");
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_basic() {
        let item = parse_item("- [test](file.js)").unwrap();
        assert_eq!(item.label, "test");
        assert_eq!(item.path, "file.js");
    }

    #[test]
    fn test_parse_item_empty_label() {
        let item = parse_item("- [](src/**/*.rs)").unwrap();
        assert_eq!(item.label, "");
        assert_eq!(item.path, "src/**/*.rs");
    }

    #[test]
    fn test_parse_item_rejects_non_checklist_lines() {
        assert_eq!(parse_item("just prose"), None);
        assert_eq!(parse_item("- [x](a.js) trailing"), None);
        assert_eq!(parse_item("* [x](a.js)"), None);
        assert_eq!(parse_item("- [x]()"), None);
        assert_eq!(parse_item("- [no separator)"), None);
    }

    #[test]
    fn test_parse_item_rejects_repeated_separator() {
        assert_eq!(parse_item("- [a](b](c)"), None);
        assert_eq!(parse_item("- [](x](y)"), None);
        assert_eq!(parse_item("- [a](b]c)").unwrap().path, "b]c");
    }

    #[test]
    fn test_parse_label_options() {
        let options = parse_label("@ls; sources ;-*.lock;-dist/**");
        assert!(options.list_only);
        assert_eq!(options.exclude, vec!["*.lock", "dist/**"]);
        assert_eq!(options.name, "sources");
    }

    #[test]
    fn test_parse_label_plain_name() {
        let options = parse_label("main entry");
        assert!(!options.list_only);
        assert!(options.exclude.is_empty());
        assert_eq!(options.name, "main entry");
    }
}
