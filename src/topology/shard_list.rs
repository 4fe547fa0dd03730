//! Textual shard lists as stored on node records.
//!
//! Two encodings are in circulation: a plain comma separated list
//! (`"0,1,2"`) and a JSON document grouping shards by table
//! (`{"ShardsList":[{"Table":"t","Shards":"0,1"}]}`).

use serde::Deserialize;
use std::collections::HashSet;

use crate::types::ShardId;

#[derive(Debug, Deserialize)]
struct TableShards {
    #[serde(rename = "Shards", default)]
    shards: String,
}

#[derive(Debug, Deserialize)]
struct ShardsByTable {
    #[serde(rename = "ShardsList", default)]
    shards_list: Vec<TableShards>,
}

/// Parse a stored shard list in either encoding.
///
/// Ids are deduplicated keeping the first occurrence. Entries that are not
/// valid ids are skipped.
pub fn parse_shard_list(raw: &str) -> Vec<ShardId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push_all = |text: &str| {
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.parse::<ShardId>() {
                Ok(id) => {
                    if seen.insert(id) {
                        out.push(id);
                    }
                }
                Err(_) => tracing::debug!(entry = part, "Skipping malformed shard id"),
            }
        }
    };

    match serde_json::from_str::<ShardsByTable>(raw) {
        Ok(by_table) => {
            for entry in &by_table.shards_list {
                push_all(&entry.shards);
            }
        }
        Err(_) => push_all(raw),
    }

    out
}

/// Render shards in the comma separated encoding.
pub fn format_shard_list(shards: &[ShardId]) -> String {
    shards
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_list() {
        assert_eq!(parse_shard_list("0,1, 2"), vec![0, 1, 2]);
        assert_eq!(parse_shard_list(""), Vec::<ShardId>::new());
        assert_eq!(parse_shard_list("3,x,3,4,"), vec![3, 4]);
    }

    #[test]
    fn test_parse_json_by_table() {
        let raw = concat!(
            r#"{"ShardsList":["#,
            r#"{"Table":"t1","Shards":"0,1"},"#,
            r#"{"Table":"t2","Shards":"1,2"},"#,
            r#"{"Table":"t3","Shards":""}"#,
            r#"]}"#
        );
        assert_eq!(parse_shard_list(raw), vec![0, 1, 2]);
    }

    #[test]
    fn test_format_roundtrips_through_parse() {
        let shards = vec![7, 1, 4];
        assert_eq!(format_shard_list(&shards), "7,1,4");
        assert_eq!(parse_shard_list(&format_shard_list(&shards)), shards);
    }
}
