//! Manifest reconciliation.
//!
//! A response may close with an `@validate` block listing, as checklist
//! lines, every filename it claims to have delivered. Validation compares the
//! set of declared filenames with the set actually decoded. Labels and order
//! are irrelevant.

use crate::checklist::parse_item;
use crate::entry::{FileEntry, Manifest};

/// Outcome of reconciling decoded entries against their manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// First `@validate` entry, if any.
    pub validate: Option<FileEntry>,
    /// Delivered filename → label (everything except `@validate`).
    pub files: Manifest,
    /// Declared filename → label from the `@validate` body.
    pub requested: Manifest,
    pub is_valid: bool,
}

/// Decode a checklist body into a manifest, skipping non-checklist lines.
pub fn read_manifest(body: &str) -> Manifest {
    body.lines()
        .filter_map(parse_item)
        .map(|item| (item.path, item.label))
        .collect()
}

/// Reconcile `entries` (document order) against their `@validate` manifest.
pub fn validate(entries: &[FileEntry]) -> Validation {
    let mut manifest_entry: Option<&FileEntry> = None;
    let mut files = Manifest::new();

    for entry in entries {
        if entry.is_validate() {
            if manifest_entry.is_none() {
                manifest_entry = Some(entry);
            }
            continue;
        }
        files.insert(entry.filename.as_str(), entry.label.as_str());
    }

    let Some(manifest_entry) = manifest_entry else {
        return Validation {
            validate: None,
            files,
            requested: Manifest::new(),
            is_valid: false,
        };
    };

    let requested = read_manifest(&manifest_entry.content);
    let is_valid = files.sorted_keys() == requested.sorted_keys();
    tracing::debug!(
        delivered = files.len(),
        declared = requested.len(),
        is_valid,
        "validated manifest"
    );

    Validation {
        validate: Some(manifest_entry.clone()),
        files,
        requested,
        is_valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(label: &str, name: &str) -> FileEntry {
        FileEntry::new(label, name).with_content("js", "x\n")
    }

    fn manifest(body: &str) -> FileEntry {
        FileEntry::new("", "@validate").with_content("md", body)
    }

    #[test]
    fn test_set_equality_ignores_order_and_labels() {
        let entries = vec![
            file("A", "a.js"),
            file("B", "b.js"),
            manifest("- [second](b.js)\n- [first](a.js)\n"),
        ];
        let result = validate(&entries);
        assert!(result.is_valid);
        assert_eq!(result.requested.get("b.js"), Some("second"));
    }

    #[test]
    fn test_mismatched_sets_fail() {
        let entries = vec![
            file("", "a.js"),
            file("", "c.js"),
            manifest("- [](a.js)\n- [](b.js)\n"),
        ];
        assert!(!validate(&entries).is_valid);
    }

    #[test]
    fn test_no_manifest_is_invalid() {
        let result = validate(&[file("a", "a.js")]);
        assert!(!result.is_valid);
        assert!(result.validate.is_none());
        assert!(result.requested.is_empty());
        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn test_commands_count_as_delivered() {
        let rm = FileEntry::new("", "@rm").with_content("", "old.txt\n");
        let entries = vec![rm, manifest("- [](@rm)\n")];
        assert!(validate(&entries).is_valid);
    }

    #[test]
    fn test_first_manifest_wins() {
        let entries = vec![
            file("", "a.js"),
            manifest("- [](a.js)\n"),
            manifest("- [](zzz.js)\n"),
        ];
        let result = validate(&entries);
        assert!(result.is_valid);
        assert_eq!(result.validate.unwrap().content, "- [](a.js)\n");
    }

    #[test]
    fn test_manifest_skips_prose_lines() {
        let requested = read_manifest("Delivered:\n- [x](x.rs)\n* [y](y.rs)\n- [z](z.rs) extra\n");
        assert_eq!(requested.keys().collect::<Vec<_>>(), vec!["x.rs"]);
    }
}
