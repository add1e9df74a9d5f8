//! Index-file codec.
//!
//! An index file describes a column group: format version, segment count,
//! the shared segment file list, and per-column sizes/content-type/metadata.
//! The on-disk representation is JSON; index files written by old toolkit
//! versions use INI instead, and both are read (JSON is attempted first and
//! any JSON parse error falls back to the INI reader). List-like fields use
//! the legacy zero-padded-key dictionary convention described in
//! [`legacy`].

pub(crate) mod legacy;

use crate::error::{BlockError, BlockResult};
use crate::filename::{format_segment_filename, parse_segment_filename};
use serde_json::{json, Map, Value as Json};
use sframe_storage::StorageError;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The only supported index-file format version.
pub const INDEX_FORMAT_VERSION: u64 = 2;

/// Index record for one logical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFileInfo {
    /// Identity of this column's index: `group_index_file:column_number`.
    pub index_file: String,
    /// Format version (always 2).
    pub version: u64,
    /// Number of segments the column spans.
    pub nsegments: usize,
    /// Fixed block size hint, in elements. Zero when unknown.
    pub block_size: u64,
    /// Content-type tag (empty when untyped).
    pub content_type: String,
    /// Per-segment element counts; `segment_sizes.len() == nsegments`.
    pub segment_sizes: Vec<u64>,
    /// Per-segment column addresses (`path:N`), one per segment.
    pub segment_files: Vec<String>,
    /// Open-ended metadata map.
    pub metadata: BTreeMap<String, String>,
}

/// Index record for one physical index file (a column group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIndexFileInfo {
    /// Path of the index file itself.
    pub group_index_file: String,
    /// Format version (always 2).
    pub version: u64,
    /// Number of segments in the group.
    pub nsegments: usize,
    /// Shared segment file list, resolved to absolute paths or URLs.
    pub segment_files: Vec<String>,
    /// One entry per column sharing this physical index.
    pub columns: Vec<IndexFileInfo>,
}

/// Parsed-but-unresolved group structure shared by the JSON and INI
/// readers; paths are not yet anchored and columns carry no file lists.
#[derive(Debug)]
pub(crate) struct RawGroup {
    pub(crate) version: u64,
    pub(crate) nsegments: usize,
    pub(crate) segment_files: Vec<String>,
    pub(crate) columns: Vec<RawColumn>,
}

#[derive(Debug)]
pub(crate) struct RawColumn {
    pub(crate) content_type: String,
    pub(crate) block_size: u64,
    pub(crate) segment_sizes: Vec<u64>,
    pub(crate) metadata: BTreeMap<String, String>,
}

/// Reads a group index file.
///
/// # Errors
///
/// - [`BlockError::OpenFailure`] if `path` cannot be read
/// - [`BlockError::ParseFailure`] if the content is neither JSON nor INI
/// - [`BlockError::UnsupportedVersion`] if the version is not 2
/// - [`BlockError::Malformed`] if a length/count invariant is violated
pub fn read_group_index(path: &str) -> BlockResult<GroupIndexFileInfo> {
    let content = fs::read_to_string(path)
        .map_err(|e| BlockError::open_failure(path, StorageError::Io(e)))?;

    let raw = match serde_json::from_str::<Json>(&content) {
        Ok(value) => parse_json_group(&value)?,
        Err(_) => legacy::parse_ini_group(path, &content)?,
    };

    finalize_group(path, raw)
}

/// Reads the index record for a single column.
///
/// The path may carry a `:N` column suffix; without one, column 0 is
/// returned.
///
/// # Errors
///
/// Same conditions as [`read_group_index`], plus
/// [`BlockError::ColumnOutOfRange`] if the suffix exceeds the group's
/// column count.
pub fn read_single_column_index(path: &str) -> BlockResult<IndexFileInfo> {
    let (index_path, column) = parse_segment_filename(path);
    let mut group = read_group_index(&index_path)?;

    let column = column.unwrap_or(0);
    let ncolumns = group.columns.len();
    if column >= ncolumns {
        return Err(BlockError::ColumnOutOfRange { column, ncolumns });
    }
    Ok(group.columns.swap_remove(column))
}

/// Writes a group index file as JSON.
///
/// Segment paths under the index file's directory are stored relative to
/// it; list-like fields are emitted in the legacy zero-padded-key
/// dictionary encoding so that old readers can still consume the file.
///
/// # Errors
///
/// - [`BlockError::UnsupportedVersion`] if `info.version` is not 2
/// - [`BlockError::Malformed`] if a length/count invariant is violated
/// - [`BlockError::IoFailure`] if the write does not complete
pub fn write_group_index(path: &str, info: &GroupIndexFileInfo) -> BlockResult<()> {
    if info.version != INDEX_FORMAT_VERSION {
        return Err(BlockError::UnsupportedVersion {
            path: path.to_string(),
            version: info.version,
        });
    }
    if info.segment_files.len() != info.nsegments {
        return Err(BlockError::malformed(format!(
            "segment_files has {} entries but num_segments is {}",
            info.segment_files.len(),
            info.nsegments
        )));
    }

    let parent = Path::new(path).parent().map(Path::to_path_buf);
    let relative_files: Vec<String> = info
        .segment_files
        .iter()
        .map(|file| relativize(file, parent.as_deref()))
        .collect();

    let mut columns = Vec::with_capacity(info.columns.len());
    for column in &info.columns {
        if column.segment_sizes.len() != info.nsegments {
            return Err(BlockError::malformed(format!(
                "segment_sizes has {} entries but num_segments is {}",
                column.segment_sizes.len(),
                info.nsegments
            )));
        }
        let metadata: Map<String, Json> = column
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), Json::String(v.clone())))
            .collect();
        columns.push(json!({
            "content_type": column.content_type,
            "block_size": column.block_size,
            "metadata": Json::Object(metadata),
            "segment_sizes": legacy::encode_padded_u64_list(&column.segment_sizes),
        }));
    }

    let document = json!({
        "sarray": {
            "version": info.version,
            "num_segments": info.nsegments,
        },
        "segment_files": legacy::encode_padded_list(&relative_files),
        "columns": columns,
    });

    let file = fs::File::create(path)
        .map_err(|e| BlockError::open_failure(path, StorageError::Io(e)))?;
    let mut writer = BufWriter::new(file);
    let emit = serde_json::to_writer_pretty(&mut writer, &document)
        .map_err(|e| BlockError::io_failure(path, e.to_string()));
    emit?;
    writer
        .flush()
        .map_err(|e| BlockError::io_failure(path, e.to_string()))?;

    tracing::debug!(path, columns = info.columns.len(), "wrote group index");
    Ok(())
}

fn parse_json_group(value: &Json) -> BlockResult<RawGroup> {
    let sarray = value
        .get("sarray")
        .and_then(Json::as_object)
        .ok_or_else(|| BlockError::malformed("missing sarray section"))?;

    let version = sarray
        .get("version")
        .and_then(Json::as_u64)
        .ok_or_else(|| BlockError::malformed("missing sarray.version"))?;
    let nsegments = sarray
        .get("num_segments")
        .and_then(Json::as_u64)
        .ok_or_else(|| BlockError::malformed("missing sarray.num_segments"))?
        as usize;

    let segment_files = value
        .get("segment_files")
        .map(|files| legacy::decode_string_list("segment_files", files))
        .transpose()?
        .unwrap_or_default();

    let column_entries = value
        .get("columns")
        .and_then(Json::as_array)
        .ok_or_else(|| BlockError::malformed("missing columns array"))?;

    let mut columns = Vec::with_capacity(column_entries.len());
    for entry in column_entries {
        let content_type = entry
            .get("content_type")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        let block_size = entry.get("block_size").and_then(Json::as_u64).unwrap_or(0);
        let segment_sizes = entry
            .get("segment_sizes")
            .map(|sizes| legacy::decode_u64_list("segment_sizes", sizes))
            .transpose()?
            .ok_or_else(|| BlockError::malformed("column is missing segment_sizes"))?;

        let mut metadata = BTreeMap::new();
        if let Some(map) = entry.get("metadata").and_then(Json::as_object) {
            for (key, item) in map {
                let item = item
                    .as_str()
                    .ok_or_else(|| BlockError::malformed("metadata values must be strings"))?;
                metadata.insert(key.clone(), item.to_string());
            }
        }

        columns.push(RawColumn {
            content_type,
            block_size,
            segment_sizes,
            metadata,
        });
    }

    Ok(RawGroup {
        version,
        nsegments,
        segment_files,
        columns,
    })
}

/// Resolves paths, checks invariants and derives per-column records.
fn finalize_group(path: &str, raw: RawGroup) -> BlockResult<GroupIndexFileInfo> {
    if raw.version != INDEX_FORMAT_VERSION {
        return Err(BlockError::UnsupportedVersion {
            path: path.to_string(),
            version: raw.version,
        });
    }
    if raw.segment_files.len() != raw.nsegments {
        return Err(BlockError::malformed(format!(
            "segment_files has {} entries but num_segments is {}",
            raw.segment_files.len(),
            raw.nsegments
        )));
    }

    let parent = Path::new(path).parent().map(Path::to_path_buf);
    let segment_files: Vec<String> = raw
        .segment_files
        .iter()
        .map(|file| anchor(file, parent.as_deref()))
        .collect();

    let mut columns = Vec::with_capacity(raw.columns.len());
    for (number, column) in raw.columns.into_iter().enumerate() {
        if column.segment_sizes.len() != raw.nsegments {
            return Err(BlockError::malformed(format!(
                "column {number}: segment_sizes has {} entries but num_segments is {}",
                column.segment_sizes.len(),
                raw.nsegments
            )));
        }

        // Give this column a private copy of the file list, appending the
        // column suffix to entries that do not already carry one.
        let column_files: Vec<String> = segment_files
            .iter()
            .map(|file| {
                let (file_path, existing) = parse_segment_filename(file);
                format_segment_filename(&file_path, existing.or(Some(number)))
            })
            .collect();

        columns.push(IndexFileInfo {
            index_file: format!("{path}:{number}"),
            version: raw.version,
            nsegments: raw.nsegments,
            block_size: column.block_size,
            content_type: column.content_type,
            segment_sizes: column.segment_sizes,
            segment_files: column_files,
            metadata: column.metadata,
        });
    }

    Ok(GroupIndexFileInfo {
        group_index_file: path.to_string(),
        version: raw.version,
        nsegments: raw.nsegments,
        segment_files,
        columns,
    })
}

/// Anchors a relative segment path at `parent`. Absolute paths and URLs
/// (anything containing `://`) pass through; a `:N` column suffix is
/// preserved.
fn anchor(file: &str, parent: Option<&Path>) -> String {
    if file.contains("://") {
        return file.to_string();
    }
    let (file_path, column) = parse_segment_filename(file);
    if Path::new(&file_path).is_absolute() {
        return file.to_string();
    }
    let Some(parent) = parent else {
        return file.to_string();
    };
    let anchored: PathBuf = parent.join(&file_path);
    format_segment_filename(&anchored.to_string_lossy(), column)
}

/// Strips `parent` from a segment path if the path lies under it.
fn relativize(file: &str, parent: Option<&Path>) -> String {
    if file.contains("://") {
        return file.to_string();
    }
    let Some(parent) = parent else {
        return file.to_string();
    };
    let (file_path, column) = parse_segment_filename(file);
    match Path::new(&file_path).strip_prefix(parent) {
        Ok(relative) => format_segment_filename(&relative.to_string_lossy(), column),
        Err(_) => file.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_group(index_path: &str, dir: &Path) -> GroupIndexFileInfo {
        let segment_files = vec![
            dir.join("seg-0000").to_string_lossy().into_owned(),
            dir.join("seg-0001").to_string_lossy().into_owned(),
        ];
        let columns = vec![
            IndexFileInfo {
                index_file: format!("{index_path}:0"),
                version: 2,
                nsegments: 2,
                block_size: 0,
                content_type: "integer".to_string(),
                segment_sizes: vec![100, 50],
                segment_files: segment_files.iter().map(|f| format!("{f}:0")).collect(),
                metadata: BTreeMap::from([("creator".to_string(), "test".to_string())]),
            },
            IndexFileInfo {
                index_file: format!("{index_path}:1"),
                version: 2,
                nsegments: 2,
                block_size: 0,
                content_type: "string".to_string(),
                segment_sizes: vec![100, 50],
                segment_files: segment_files.iter().map(|f| format!("{f}:1")).collect(),
                metadata: BTreeMap::new(),
            },
        ];
        GroupIndexFileInfo {
            group_index_file: index_path.to_string(),
            version: 2,
            nsegments: 2,
            segment_files,
            columns,
        }
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let index_str = index_path.to_str().unwrap();

        let info = sample_group(index_str, dir.path());
        write_group_index(index_str, &info).unwrap();

        let read = read_group_index(index_str).unwrap();
        assert_eq!(read.version, 2);
        assert_eq!(read.nsegments, 2);
        assert_eq!(read.segment_files, info.segment_files);
        assert_eq!(read.columns.len(), 2);
        assert_eq!(read.columns[0].segment_sizes, vec![100, 50]);
        assert_eq!(read.columns[0].content_type, "integer");
        assert_eq!(read.columns[0].metadata["creator"], "test");
        assert_eq!(read.columns[1].content_type, "string");
        assert_eq!(read.columns[1].segment_files, info.columns[1].segment_files);
    }

    #[test]
    fn written_file_uses_legacy_dictionary_encoding() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let index_str = index_path.to_str().unwrap();

        write_group_index(index_str, &sample_group(index_str, dir.path())).unwrap();

        let document: Json =
            serde_json::from_str(&fs::read_to_string(&index_path).unwrap()).unwrap();
        assert!(document["segment_files"].is_object());
        assert!(document["segment_files"].get("0000").is_some());
        assert!(document["columns"][0]["segment_sizes"].get("0001").is_some());
    }

    #[test]
    fn relative_paths_are_anchored_at_index_parent() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let content = json!({
            "sarray": {"version": 2, "num_segments": 1},
            "segment_files": {"0000": "seg-0000"},
            "columns": [{"content_type": "", "segment_sizes": {"0000": 7}}],
        });
        fs::write(&index_path, serde_json::to_string(&content).unwrap()).unwrap();

        let read = read_group_index(index_path.to_str().unwrap()).unwrap();
        let expected = dir.path().join("seg-0000").to_string_lossy().into_owned();
        assert_eq!(read.segment_files, vec![expected.clone()]);
        assert_eq!(read.columns[0].segment_files, vec![format!("{expected}:0")]);
    }

    #[test]
    fn url_paths_pass_through() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let content = json!({
            "sarray": {"version": 2, "num_segments": 1},
            "segment_files": {"0000": "s3://bucket/seg-0000"},
            "columns": [{"content_type": "", "segment_sizes": {"0000": 7}}],
        });
        fs::write(&index_path, serde_json::to_string(&content).unwrap()).unwrap();

        let read = read_group_index(index_path.to_str().unwrap()).unwrap();
        assert_eq!(read.segment_files, vec!["s3://bucket/seg-0000"]);
        assert_eq!(
            read.columns[0].segment_files,
            vec!["s3://bucket/seg-0000:0"]
        );
    }

    #[test]
    fn missing_file_is_open_failure() {
        let result = read_group_index("/nope/frame.sidx");
        assert!(matches!(result, Err(BlockError::OpenFailure { .. })));
    }

    #[test]
    fn garbage_content_is_parse_failure() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        fs::write(&index_path, "{{{{ not json, not ini").unwrap();

        let result = read_group_index(index_path.to_str().unwrap());
        assert!(matches!(result, Err(BlockError::ParseFailure { .. })));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let content = json!({
            "sarray": {"version": 3, "num_segments": 0},
            "segment_files": {},
            "columns": [],
        });
        fs::write(&index_path, serde_json::to_string(&content).unwrap()).unwrap();

        let result = read_group_index(index_path.to_str().unwrap());
        assert!(matches!(
            result,
            Err(BlockError::UnsupportedVersion { version: 3, .. })
        ));
    }

    #[test]
    fn segment_count_disagreement_is_malformed() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let content = json!({
            "sarray": {"version": 2, "num_segments": 3},
            "segment_files": {"0000": "a", "0001": "b"},
            "columns": [],
        });
        fs::write(&index_path, serde_json::to_string(&content).unwrap()).unwrap();

        let result = read_group_index(index_path.to_str().unwrap());
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn segment_sizes_disagreement_is_malformed() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let content = json!({
            "sarray": {"version": 2, "num_segments": 2},
            "segment_files": {"0000": "a", "0001": "b"},
            "columns": [{"content_type": "", "segment_sizes": {"0000": 7}}],
        });
        fs::write(&index_path, serde_json::to_string(&content).unwrap()).unwrap();

        let result = read_group_index(index_path.to_str().unwrap());
        assert!(matches!(result, Err(BlockError::Malformed { .. })));
    }

    #[test]
    fn legacy_ini_index_is_read() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("legacy.sidx");
        let content = "\
[sarray]
version=2
num_segments=3
content_type=float
[segment_files]
0000=seg-0000
0001=seg-0001
0002=seg-0002
[segment_sizes]
0000=5
0001=6
0002=7
";
        fs::write(&index_path, content).unwrap();

        let read = read_group_index(index_path.to_str().unwrap()).unwrap();
        assert_eq!(read.nsegments, 3);
        assert_eq!(read.columns.len(), 1);
        assert_eq!(read.columns[0].segment_sizes, vec![5, 6, 7]);
        assert_eq!(read.columns[0].content_type, "float");
        assert!(read.segment_files[0].ends_with("seg-0000"));
        assert!(read.columns[0].segment_files[0].ends_with("seg-0000:0"));
    }

    #[test]
    fn single_column_index_selects_suffix() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let index_str = index_path.to_str().unwrap();
        write_group_index(index_str, &sample_group(index_str, dir.path())).unwrap();

        let column1 = read_single_column_index(&format!("{index_str}:1")).unwrap();
        assert_eq!(column1.content_type, "string");
        assert_eq!(column1.index_file, format!("{index_str}:1"));

        let column0 = read_single_column_index(index_str).unwrap();
        assert_eq!(column0.content_type, "integer");

        let result = read_single_column_index(&format!("{index_str}:9"));
        assert!(matches!(
            result,
            Err(BlockError::ColumnOutOfRange { column: 9, .. })
        ));
    }

    #[test]
    fn write_rejects_wrong_version() {
        let dir = tempdir().unwrap();
        let index_path = dir.path().join("frame.sidx");
        let index_str = index_path.to_str().unwrap();
        let mut info = sample_group(index_str, dir.path());
        info.version = 1;

        let result = write_group_index(index_str, &info);
        assert!(matches!(result, Err(BlockError::UnsupportedVersion { .. })));
    }
}
