use crate::error::ArchiverError;
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const MOZ_LZ4_MAGIC: &[u8; 8] = b"mozLz40\0";
// An LZ4 block expands at most ~255x.
const LZ4_MAX_RATIO: usize = 255;

#[derive(Debug, Clone, Deserialize)]
pub struct FolderNode {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub children: Vec<BookmarkNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkLeaf {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "uri")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeparatorNode {
    #[serde(default)]
    pub id: u64,
}

/// One node of a Firefox bookmark backup. Unknown `type` values fail decoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BookmarkNode {
    #[serde(rename = "text/x-moz-place-container")]
    Folder(FolderNode),
    #[serde(rename = "text/x-moz-place")]
    Bookmark(BookmarkLeaf),
    #[serde(rename = "text/x-moz-place-separator")]
    Separator(SeparatorNode),
}

impl BookmarkNode {
    pub fn id(&self) -> u64 {
        match self {
            Self::Folder(folder) => folder.id,
            Self::Bookmark(leaf) => leaf.id,
            Self::Separator(sep) => sep.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkEntry {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub folder_found: bool,
    pub entries: Vec<BookmarkEntry>,
}

fn parse_error(path: &Path, reason: impl std::fmt::Display) -> anyhow::Error {
    ArchiverError::Parse(format!("{}: {reason}", path.display())).into()
}

fn decode_payload(path: &Path, raw: &[u8]) -> Result<Vec<u8>> {
    let Some(body) = raw.strip_prefix(MOZ_LZ4_MAGIC.as_slice()) else {
        return Ok(raw.to_vec());
    };
    let Some((size, block)) = body.split_first_chunk::<4>() else {
        return Err(parse_error(path, "lz4 header truncated"));
    };
    let declared = u32::from_le_bytes(*size) as usize;
    if declared > block.len().saturating_mul(LZ4_MAX_RATIO) {
        return Err(parse_error(
            path,
            format!(
                "lz4 header claims {declared} bytes from a {}-byte block",
                block.len()
            ),
        ));
    }
    lz4_flex::block::decompress(block, declared)
        .map_err(|err| parse_error(path, format!("lz4 block corrupt: {err}")))
}

pub fn parse_snapshot(path: &Path, raw: &[u8]) -> Result<BookmarkNode> {
    let json = decode_payload(path, raw)?;
    serde_json::from_slice(&json).map_err(|err| parse_error(path, err))
}

/// Read a `.json` or `.jsonlz4` bookmark backup into a tree.
pub fn read_snapshot(path: &Path) -> Result<BookmarkNode> {
    let raw = fs::read(path).map_err(|err| parse_error(path, format!("unreadable: {err}")))?;
    parse_snapshot(path, &raw)
}

/// Depth-first pre-order search; the first folder titled `name` wins.
pub fn find_folder<'a>(node: &'a BookmarkNode, name: &str) -> Option<&'a FolderNode> {
    let BookmarkNode::Folder(folder) = node else {
        return None;
    };
    if folder.title == name {
        return Some(folder);
    }
    folder
        .children
        .iter()
        .find_map(|child| find_folder(child, name))
}

fn collect_into(folder: &FolderNode, seen: &mut HashSet<String>, out: &mut Vec<BookmarkEntry>) {
    for child in &folder.children {
        match child {
            BookmarkNode::Folder(sub) => collect_into(sub, seen, out),
            BookmarkNode::Bookmark(leaf) => {
                if seen.insert(leaf.url.clone()) {
                    out.push(BookmarkEntry {
                        url: leaf.url.clone(),
                        title: leaf.title.clone(),
                    });
                } else {
                    log::debug!("dropping duplicate {} (node {})", leaf.url, child.id());
                }
            }
            BookmarkNode::Separator(_) => {}
        }
    }
}

/// Every bookmark under `folder`, nesting flattened in store order, URLs unique.
pub fn collect_bookmarks(folder: &FolderNode) -> Vec<BookmarkEntry> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_into(folder, &mut seen, &mut out);
    out
}

pub fn extract_target(root: &BookmarkNode, folder_name: &str) -> Extraction {
    match find_folder(root, folder_name) {
        Some(folder) => {
            log::debug!("target folder {folder_name:?} is node {}", folder.id);
            Extraction {
                folder_found: true,
                entries: collect_bookmarks(folder),
            }
        }
        None => Extraction::default(),
    }
}
