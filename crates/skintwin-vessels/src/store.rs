//! On-disk vessel tree.
//!
//! ```text
//! vessels/
//!   examples/       tab-separated source tables
//!   ingredients/    <id>_<label>.json   create-if-absent
//!   products/       <id>.json           merge derived fields
//!   suppliers/      <id>_<label>.json   merge derived fields
//!   formulations/   <id>.json           merge derived fields
//!   edges/          <edge id>.json + all_edges.json
//!   database/       node registry, statistics, analysis, relationships
//! ```
//!
//! Vessel bodies are schema-free JSON objects. The store only ever replaces
//! the top-level keys a stage owns; every other key is written back as read.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use skintwin_hypergraph::{EdgeRecord, NodeRegistry};

use crate::config::VesselLayout;
use crate::error::{io_err, json_err, Result, VesselError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VesselKind {
    Ingredient,
    Product,
    Supplier,
    Formulation,
}

impl VesselKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VesselKind::Ingredient => "ingredient",
            VesselKind::Product => "product",
            VesselKind::Supplier => "supplier",
            VesselKind::Formulation => "formulation",
        }
    }
}

/// How a stage writes an entity's vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write only when no vessel exists; an existing file is never touched.
    CreateIfAbsent,
    /// Replace the owned top-level keys of an existing vessel, keeping all
    /// others; create the vessel when absent.
    MergeDerivedFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Merged,
    SkippedExisting,
}

/// A vessel file read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub path: PathBuf,
    pub body: Map<String, Value>,
}

impl Vessel {
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// A non-empty string field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Index vessels by their `id` field. The first vessel (in file-name order)
/// wins when two files declare the same id.
pub fn index_by_id(vessels: &[Vessel]) -> BTreeMap<&str, &Vessel> {
    let mut out = BTreeMap::new();
    for v in vessels {
        if let Some(id) = v.id() {
            out.entry(id).or_insert(v);
        }
    }
    out
}

// =============================================================================
// File naming
// =============================================================================

/// Replace every character outside `[A-Za-z0-9]` with `_` and keep at most
/// `limit` characters.
pub fn sanitize_label(label: &str, limit: usize) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(limit)
        .collect()
}

/// Ids keep `-` and `_`; anything else unsafe in a file name becomes `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Longest file stem (name without `.json`) the store writes.
pub const MAX_STEM_BYTES: usize = 200;

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest[..8].iter() {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Cap a sanitized (ASCII) stem at [`MAX_STEM_BYTES`]. A truncated stem ends
/// in `_<hash of the full stem>` so distinct long ids keep distinct names.
pub fn bounded_stem(stem: String) -> String {
    if stem.len() <= MAX_STEM_BYTES {
        return stem;
    }
    let hash = short_hash(&stem);
    let keep = MAX_STEM_BYTES - hash.len() - 1;
    format!("{}_{}", &stem[..keep], hash)
}

/// `<id>_<sanitized label>.json`
pub fn labelled_file_name(id: &str, label: &str, limit: usize) -> String {
    let stem = format!("{}_{}", sanitize_id(id), sanitize_label(label, limit));
    format!("{}.json", bounded_stem(stem))
}

/// `<id>.json`
pub fn id_file_name(id: &str) -> String {
    format!("{}.json", bounded_stem(sanitize_id(id)))
}

// =============================================================================
// JSON helpers
// =============================================================================

/// Pretty-print `value` to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let mut text = serde_json::to_string_pretty(value).map_err(json_err(path))?;
    text.push('\n');
    std::fs::write(path, text).map_err(io_err(path))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&text).map_err(json_err(path))
}

/// Serialize a struct of owned fields into a top-level key map.
pub fn to_fields<T: Serialize>(value: &T, path: &Path) -> Result<Map<String, Value>> {
    match serde_json::to_value(value).map_err(json_err(path))? {
        Value::Object(map) => Ok(map),
        _ => Err(VesselError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json::<Value>(path)? {
        Value::Object(map) => Ok(map),
        _ => Err(VesselError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct VesselStore {
    root: PathBuf,
    layout: VesselLayout,
}

impl VesselStore {
    pub fn new(root: impl Into<PathBuf>, layout: VesselLayout) -> Self {
        VesselStore {
            root: root.into(),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &VesselLayout {
        &self.layout
    }

    pub fn dir(&self, kind: VesselKind) -> PathBuf {
        let name = match kind {
            VesselKind::Ingredient => &self.layout.ingredients_dir,
            VesselKind::Product => &self.layout.products_dir,
            VesselKind::Supplier => &self.layout.suppliers_dir,
            VesselKind::Formulation => &self.layout.formulations_dir,
        };
        self.root.join(name)
    }

    pub fn source_table(&self, file_name: &str) -> PathBuf {
        self.root.join(&self.layout.sources_dir).join(file_name)
    }

    pub fn edges_dir(&self) -> PathBuf {
        self.root.join(&self.layout.edges_dir)
    }

    pub fn all_edges_path(&self) -> PathBuf {
        self.edges_dir().join(&self.layout.all_edges_file)
    }

    pub fn database_file(&self, file_name: &str) -> PathBuf {
        self.root.join(&self.layout.database_dir).join(file_name)
    }

    pub fn node_registry_path(&self) -> PathBuf {
        self.database_file(&self.layout.node_registry_file)
    }

    /// Read every `*.json` vessel of a kind, sorted by file name.
    ///
    /// A missing directory yields no vessels. Files that fail to parse, or
    /// whose body is not an object, are skipped with a warning.
    pub fn load_all(&self, kind: VesselKind) -> Result<Vec<Vessel>> {
        let dir = self.dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| VesselError::Io {
                path: dir.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            match read_object(path) {
                Ok(body) => out.push(Vessel {
                    path: path.to_path_buf(),
                    body,
                }),
                Err(err) => {
                    tracing::warn!(
                        kind = kind.as_str(),
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable vessel"
                    );
                }
            }
        }
        tracing::debug!(kind = kind.as_str(), count = out.len(), "loaded vessels");
        Ok(out)
    }

    /// Write `fields` to the vessel at `path` under `policy`.
    ///
    /// `existing` is the body read at stage start, if the stage found one;
    /// otherwise the file on disk (if any) is consulted.
    pub fn write_vessel(
        &self,
        path: &Path,
        existing: Option<&Map<String, Value>>,
        fields: Map<String, Value>,
        policy: WritePolicy,
    ) -> Result<WriteOutcome> {
        match policy {
            WritePolicy::CreateIfAbsent => {
                if existing.is_some() || path.exists() {
                    return Ok(WriteOutcome::SkippedExisting);
                }
                write_json(path, &fields)?;
                Ok(WriteOutcome::Created)
            }
            WritePolicy::MergeDerivedFields => {
                let base = match existing {
                    Some(body) => Some(body.clone()),
                    None if path.exists() => Some(read_object(path)?),
                    None => None,
                };
                let outcome = if base.is_some() {
                    WriteOutcome::Merged
                } else {
                    WriteOutcome::Created
                };
                let mut body = base.unwrap_or_default();
                for (key, value) in fields {
                    body.insert(key, value);
                }
                write_json(path, &body)?;
                Ok(outcome)
            }
        }
    }

    // =========================================================================
    // Edges and database files
    // =========================================================================

    /// Write one `<edge id>.json` per record. Records sharing an id land in
    /// the same file; the later one wins.
    pub fn write_edge_files(&self, edges: &[EdgeRecord]) -> Result<()> {
        let dir = self.edges_dir();
        for edge in edges {
            write_json(&dir.join(id_file_name(&edge.id)), edge)?;
        }
        Ok(())
    }

    pub fn write_all_edges(&self, edges: &[EdgeRecord]) -> Result<()> {
        write_json(&self.all_edges_path(), edges)
    }

    /// The consolidated edge set. Required: a missing or unparsable file is
    /// an error.
    pub fn load_edges(&self) -> Result<Vec<EdgeRecord>> {
        let path = self.all_edges_path();
        if !path.exists() {
            return Err(VesselError::MissingInput { path });
        }
        read_json(&path)
    }

    pub fn load_edges_if_present(&self) -> Result<Option<Vec<EdgeRecord>>> {
        let path = self.all_edges_path();
        if path.exists() {
            read_json(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn write_node_registry(&self, registry: &NodeRegistry) -> Result<()> {
        write_json(&self.node_registry_path(), registry)
    }

    pub fn load_node_registry(&self) -> Result<NodeRegistry> {
        let path = self.node_registry_path();
        if !path.exists() {
            return Err(VesselError::MissingInput { path });
        }
        read_json(&path)
    }

    pub fn load_node_registry_if_present(&self) -> Result<Option<NodeRegistry>> {
        let path = self.node_registry_path();
        if path.exists() {
            read_json(&path).map(Some)
        } else {
            Ok(None)
        }
    }
}
