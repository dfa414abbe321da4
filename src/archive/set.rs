//! A set of archives searched as one file system
//!
//! Game data is split across several archives in one directory, with the
//! expansion archives overriding files of the base game. [`ArchiveSet`]
//! opens them all and routes every lookup to the archive that owns the
//! file, using each archive's listfile to build the routing table.

use super::{Archive, SectorStream};
use crate::{MpqError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where to find archives and how to order them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSetConfig {
    /// Directory holding the `*.mpq` files
    pub data_dir: PathBuf,
    /// Archives whose file name starts with one of these are skipped
    pub excluded_prefixes: Vec<String>,
    /// Archives whose file name starts with one of these override the rest
    pub expansion_prefixes: Vec<String>,
}

impl Default for ArchiveSetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            excluded_prefixes: vec!["patch".to_string()],
            expansion_prefixes: vec!["d2exp".to_string(), "d2x".to_string()],
        }
    }
}

impl ArchiveSetConfig {
    /// Default configuration for `data_dir`
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Set the data directory
    pub fn data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Replace the excluded prefixes
    pub fn excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the expansion prefixes
    pub fn expansion_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expansion_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn has_prefix(prefixes: &[String], file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_ascii_lowercase()))
    }

    fn is_excluded(&self, file_name: &str) -> bool {
        Self::has_prefix(&self.excluded_prefixes, file_name)
    }

    fn is_expansion(&self, file_name: &str) -> bool {
        Self::has_prefix(&self.expansion_prefixes, file_name)
    }
}

/// Archives of one data directory, searched as one
#[derive(Debug)]
pub struct ArchiveSet {
    archives: Vec<Archive>,
    lookup: HashMap<String, usize>,
}

impl ArchiveSet {
    /// Open every archive in the configured directory
    pub fn open(config: &ArchiveSetConfig) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&config.data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_mpq(path))
            .filter(|path| !config.is_excluded(&file_name(path)))
            .collect();
        paths.sort_by_key(|path| file_name(path));

        let mut archives = Vec::with_capacity(paths.len());
        for path in &paths {
            log::debug!("Loading archive {}", path.display());
            archives.push(Archive::open(path)?);
        }

        let mut set = Self {
            archives,
            lookup: HashMap::new(),
        };

        // Base archives first so expansion archives override them
        let (expansion, base): (Vec<usize>, Vec<usize>) = (0..paths.len())
            .partition(|&i| config.is_expansion(&file_name(&paths[i])));
        for index in base.into_iter().chain(expansion) {
            set.register(index)?;
        }

        log::debug!(
            "Archive set: {} archives, {} files",
            set.archives.len(),
            set.lookup.len()
        );
        Ok(set)
    }

    fn register(&mut self, index: usize) -> Result<()> {
        for name in self.archives[index].file_names()? {
            self.lookup.insert(name.to_ascii_lowercase(), index);
        }
        Ok(())
    }

    /// The opened archives, in file name order
    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    /// Number of distinct files known through listfiles
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Whether no listfile named any file
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Whether some archive owns `name` (case-insensitive)
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(&name.to_ascii_lowercase())
    }

    /// The archive that owns `name`
    pub fn archive_for(&self, name: &str) -> Result<&Archive> {
        self.lookup
            .get(&name.to_ascii_lowercase())
            .map(|&index| &self.archives[index])
            .ok_or_else(|| MpqError::NotFound(name.to_string()))
    }

    /// Open a file from the archive that owns it
    pub fn open_file(&self, name: &str) -> Result<SectorStream<'_>> {
        self.archive_for(name)?.open_file(name)
    }

    /// Read a whole file from the archive that owns it
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.archive_for(name)?.read_file(name)
    }

    /// Read a text file and split it into lines on `\n`
    pub fn read_text_lines(&self, name: &str) -> Result<Vec<String>> {
        let data = self.read_file(name)?;
        Ok(String::from_utf8_lossy(&data)
            .split('\n')
            .map(str::to_string)
            .collect())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_mpq(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mpq"))
}
