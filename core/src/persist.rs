use crate::CatalogRecord;
use anyhow::{Context, Result};
use bincode;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_records: u32,
    pub created_at: String,
    pub version: u32,
}

/// Layout of a catalog snapshot directory.
pub struct CatalogPaths {
    pub root: PathBuf,
}

impl CatalogPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn catalog(&self) -> PathBuf { self.root.join("catalog.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Records are stored in order; that order is the tie-break order when ranking.
pub fn save_catalog(paths: &CatalogPaths, records: &[CatalogRecord]) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.catalog())?;
    let bytes = bincode::serialize(records)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_catalog(paths: &CatalogPaths) -> Result<Vec<CatalogRecord>> {
    let file = paths.catalog();
    let mut f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let records = bincode::deserialize(&buf)?;
    Ok(records)
}

pub fn save_meta(paths: &CatalogPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &CatalogPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load records and meta, checking they agree.
pub fn load_snapshot(paths: &CatalogPaths) -> Result<(Vec<CatalogRecord>, MetaFile)> {
    let meta = load_meta(paths)?;
    let records = load_catalog(paths)?;
    if meta.num_records as usize != records.len() {
        tracing::warn!(expected = meta.num_records, found = records.len(), "snapshot meta disagrees with catalog");
    }
    Ok((records, meta))
}
