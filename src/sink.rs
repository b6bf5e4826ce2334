//! Serialization of the result list.
//!
//! The artifact is a UTF-8 JSON array of `{name, gid, members_count}`
//! records, pretty-printed with four-space indentation. Non-ASCII text is
//! written as-is rather than escaped.

use crate::analyzer::UnsharedGroupRecord;
use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Renders `records` as the result artifact.
pub fn to_json(records: &[UnsharedGroupRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    records.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Writes the result artifact to `path`, creating parent directories.
pub fn write_json(path: &Path, records: &[UnsharedGroupRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, to_json(records)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::GroupId;

    fn record(name: &str, gid: u64, members: Option<u64>) -> UnsharedGroupRecord {
        UnsharedGroupRecord {
            name: name.to_string(),
            gid: GroupId::new(gid).unwrap(),
            members_count: members,
        }
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(to_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_four_space_indent_and_field_order() {
        let json = to_json(&[record("Rust", 7, Some(1200))]).unwrap();
        let expected = "[\n    {\n        \"name\": \"Rust\",\n        \"gid\": 7,\n        \"members_count\": 1200\n    }\n]";
        assert_eq!(json, expected);
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let json = to_json(&[record("Книжный клуб", 1, None)]).unwrap();
        assert!(json.contains("Книжный клуб"));
        assert!(json.contains("\"members_count\": null"));
    }

    #[test]
    fn test_write_json_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("groups.json");
        write_json(&path, &[record("A", 2, Some(3))]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<UnsharedGroupRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, vec![record("A", 2, Some(3))]);
    }
}
