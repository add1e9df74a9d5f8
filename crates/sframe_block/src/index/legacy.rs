//! Legacy index-file encodings.
//!
//! The index format predates JSON support: it was originally INI, and INI
//! has no list syntax, so list-like fields were stored as dictionaries
//! keyed by zero-padded four-digit indexes (`"0000"`, `"0001"`, ...). The
//! JSON format kept that dictionary convention for backward compatibility,
//! and old INI index files are still read directly.

use crate::error::{BlockError, BlockResult};
use crate::index::{RawColumn, RawGroup};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Encodes a list of strings as a zero-padded-key dictionary.
pub(crate) fn encode_padded_list<S: AsRef<str>>(items: &[S]) -> Json {
    let mut map = Map::new();
    for (i, item) in items.iter().enumerate() {
        map.insert(format!("{i:04}"), Json::String(item.as_ref().to_string()));
    }
    Json::Object(map)
}

/// Encodes a list of integers as a zero-padded-key dictionary.
pub(crate) fn encode_padded_u64_list(items: &[u64]) -> Json {
    let mut map = Map::new();
    for (i, item) in items.iter().enumerate() {
        map.insert(format!("{i:04}"), Json::from(*item));
    }
    Json::Object(map)
}

/// Decodes a list-like JSON field: either a plain array or the legacy
/// zero-padded-key dictionary.
pub(crate) fn decode_string_list(field: &str, value: &Json) -> BlockResult<Vec<String>> {
    match value {
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    BlockError::malformed(format!("{field}: expected string entries"))
                })
            })
            .collect(),
        Json::Object(map) => {
            let ordered = ordered_entries(field, map)?;
            ordered
                .into_iter()
                .map(|(_, item)| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        BlockError::malformed(format!("{field}: expected string entries"))
                    })
                })
                .collect()
        }
        _ => Err(BlockError::malformed(format!(
            "{field}: expected a list or an index-keyed dictionary"
        ))),
    }
}

/// Decodes a list-like JSON field of integers. Values may be numbers or
/// numeric strings (old INI-derived files store everything as strings).
pub(crate) fn decode_u64_list(field: &str, value: &Json) -> BlockResult<Vec<u64>> {
    match value {
        Json::Array(items) => items.iter().map(|item| u64_entry(field, item)).collect(),
        Json::Object(map) => {
            let ordered = ordered_entries(field, map)?;
            ordered
                .into_iter()
                .map(|(_, item)| u64_entry(field, item))
                .collect()
        }
        _ => Err(BlockError::malformed(format!(
            "{field}: expected a list or an index-keyed dictionary"
        ))),
    }
}

fn u64_entry(field: &str, item: &Json) -> BlockResult<u64> {
    match item {
        Json::Number(n) => n
            .as_u64()
            .ok_or_else(|| BlockError::malformed(format!("{field}: negative or fractional entry"))),
        Json::String(s) => s
            .parse::<u64>()
            .map_err(|_| BlockError::malformed(format!("{field}: non-numeric entry {s:?}"))),
        _ => Err(BlockError::malformed(format!(
            "{field}: expected numeric entries"
        ))),
    }
}

/// Orders dictionary entries by their numeric key (`"0000"` first).
fn ordered_entries<'a>(
    field: &str,
    map: &'a Map<String, Json>,
) -> BlockResult<Vec<(usize, &'a Json)>> {
    let mut entries = BTreeMap::new();
    for (key, value) in map {
        let index = key.parse::<usize>().map_err(|_| {
            BlockError::malformed(format!("{field}: non-numeric dictionary key {key:?}"))
        })?;
        entries.insert(index, value);
    }
    Ok(entries.into_iter().collect())
}

/// Parses a legacy INI index file into the raw (single-column) group model.
///
/// The INI layout stores one column per physical index file:
///
/// ```text
/// [sarray]
/// version=2
/// num_segments=3
/// content_type=integer
/// [segment_files]
/// 0000=seg-0000
/// [segment_sizes]
/// 0000=120
/// [metadata]
/// key=value
/// ```
pub(crate) fn parse_ini_group(path: &str, content: &str) -> BlockResult<RawGroup> {
    let mut section = String::new();
    let mut version: Option<u64> = None;
    let mut nsegments: Option<u64> = None;
    let mut block_size = 0u64;
    let mut content_type = String::new();
    let mut segment_files: BTreeMap<usize, String> = BTreeMap::new();
    let mut segment_sizes: BTreeMap<usize, u64> = BTreeMap::new();
    let mut metadata: BTreeMap<String, String> = BTreeMap::new();
    let mut saw_sarray = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            if section == "sarray" {
                saw_sarray = true;
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(BlockError::parse_failure(path));
        };
        let key = key.trim();
        let value = value.trim();

        match section.as_str() {
            "sarray" => match key {
                "version" => {
                    version = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| BlockError::parse_failure(path))?,
                    );
                }
                "num_segments" => {
                    nsegments = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| BlockError::parse_failure(path))?,
                    );
                }
                "block_size" => {
                    block_size = value
                        .parse::<u64>()
                        .map_err(|_| BlockError::parse_failure(path))?;
                }
                "content_type" => content_type = value.to_string(),
                _ => {}
            },
            "segment_files" => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| BlockError::parse_failure(path))?;
                segment_files.insert(index, value.to_string());
            }
            "segment_sizes" => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| BlockError::parse_failure(path))?;
                let size = value
                    .parse::<u64>()
                    .map_err(|_| BlockError::parse_failure(path))?;
                segment_sizes.insert(index, size);
            }
            "metadata" => {
                metadata.insert(key.to_string(), value.to_string());
            }
            _ => {}
        }
    }

    if !saw_sarray {
        return Err(BlockError::parse_failure(path));
    }
    let version = version.ok_or_else(|| BlockError::parse_failure(path))?;
    let nsegments = nsegments.ok_or_else(|| BlockError::parse_failure(path))? as usize;

    Ok(RawGroup {
        version,
        nsegments,
        segment_files: segment_files.into_values().collect(),
        columns: vec![RawColumn {
            content_type,
            block_size,
            segment_sizes: segment_sizes.into_values().collect(),
            metadata,
        }],
    })
}
