//! Locale resource files: loading, batch merging and locale discovery.
//!
//! A resource is a flat JSON object (ARB style) mapping keys to strings.
//! Keys beginning with `@` carry metadata and may hold arbitrary JSON; they
//! are preserved on merge but never offered for translation.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Resource for '{0}' is not a JSON object")]
    NotAnObject(String),

    #[error("Failed to serialize resource for '{locale}': {source}")]
    Serialize {
        locale: String,
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Key/value contents of one locale's resource file.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleResource {
    locale: String,
    entries: BTreeMap<String, Value>,
}

impl LocaleResource {
    pub fn empty(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Build a resource from a parsed JSON document, which must be an object.
    pub fn from_value(locale: &str, value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self {
                locale: locale.to_string(),
                entries: map.into_iter().collect(),
            }),
            _ => Err(StoreError::NotAnObject(locale.to_string())),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// String entries that are not metadata, in key order.
    pub fn translatable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| {
            if k.starts_with('@') {
                return None;
            }
            v.as_str().map(|s| (k.as_str(), s))
        })
    }

    /// Overlay new entries. New values win on key collision.
    pub fn merge(&mut self, new_entries: &BTreeMap<String, String>) {
        for (key, value) in new_entries {
            self.entries.insert(key.clone(), Value::String(value.clone()));
        }
    }

    /// Pretty JSON with 2-space indentation, sorted keys and literal UTF-8.
    pub fn to_json(&self) -> Result<String, StoreError> {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::to_string_pretty(&map).map_err(|source| StoreError::Serialize {
            locale: self.locale.clone(),
            source,
        })
    }
}

/// Load a resource file. A missing file yields an empty resource.
pub fn load(path: &Path, locale: &str) -> Result<LocaleResource, StoreError> {
    if !path.is_file() {
        debug!("No resource at {}, starting empty", path.display());
        return Ok(LocaleResource::empty(locale));
    }

    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    LocaleResource::from_value(locale, value)
}

/// Write a resource through a temporary file in the destination directory,
/// renamed over the target once fully written.
pub fn write(path: &Path, resource: &LocaleResource) -> Result<(), StoreError> {
    let json = resource.to_json()?;
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// File layout of a set of locale resources.
///
/// Resources are read from `output_dir` when a file already exists there
/// (an earlier batch or run), otherwise from `input_dir`, and are always
/// written to `output_dir`. A locale found by [`ResourceStore::discover`]
/// keeps the file name it was found under (`app_pt_BR.arb` for `pt`).
#[derive(Debug, Clone)]
pub struct ResourceStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    extension: String,
    discovered: BTreeMap<String, String>,
}

impl ResourceStore {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            prefix: "app".to_string(),
            extension: "arb".to_string(),
            discovered: BTreeMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self, locale: &str) -> String {
        match self.discovered.get(locale) {
            Some(name) => name.clone(),
            None => format!("{}_{}.{}", self.prefix, locale, self.extension),
        }
    }

    pub fn input_path(&self, locale: &str) -> PathBuf {
        self.input_dir.join(self.file_name(locale))
    }

    pub fn output_path(&self, locale: &str) -> PathBuf {
        self.output_dir.join(self.file_name(locale))
    }

    /// Current contents of a locale's resource (empty when absent).
    pub fn load(&self, locale: &str) -> Result<LocaleResource, StoreError> {
        let output = self.output_path(locale);
        if output.is_file() {
            return load(&output, locale);
        }
        load(&self.input_path(locale), locale)
    }

    /// Merge `new_entries` into the locale's current contents and write the
    /// result back. Returns the merged resource.
    pub fn merge(
        &self,
        locale: &str,
        new_entries: &BTreeMap<String, String>,
    ) -> Result<LocaleResource, StoreError> {
        let mut resource = self.load(locale)?;
        resource.merge(new_entries);

        let path = self.output_path(locale);
        info!(
            "Writing {} ({} new entries, {} total)",
            path.display(),
            new_entries.len(),
            resource.len()
        );
        write(&path, &resource)?;

        Ok(resource)
    }

    /// Scan the input directory for resource files with the configured
    /// prefix and extension. Returns their locale codes, sorted, and
    /// remembers each file name so later loads and writes go back to it.
    pub fn discover(&mut self) -> Result<Vec<String>, StoreError> {
        self.discovered = discover_resources(&self.input_dir, &self.prefix, &self.extension)?;
        Ok(self.discovered.keys().cloned().collect())
    }
}

static RESOURCE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Prefix and locale code of a resource file name: the tokens before the
/// first and between the first and second `_`/`.` delimiters.
fn split_resource_name(file_name: &str) -> Option<(&str, &str)> {
    let regex = RESOURCE_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^([^_.]*)[_.]([^_.]+)[_.]").expect("resource name pattern is valid")
    });

    let caps = regex.captures(file_name)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Locale code of a resource file name (`app_en.arb` -> `en`).
pub fn locale_code_from_file_name(file_name: &str) -> Option<&str> {
    split_resource_name(file_name).map(|(_, code)| code)
}

/// Resource files in `dir` named `<prefix>_<code>...<extension>`, keyed by
/// locale code. When several files share a code the exact
/// `<prefix>_<code>.<extension>` name wins, otherwise the first name in
/// sort order; the others are skipped with a warning.
pub fn discover_resources(
    dir: &Path,
    prefix: &str,
    extension: &str,
) -> Result<BTreeMap<String, String>, StoreError> {
    let read_err = |source: std::io::Error| StoreError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut found: BTreeMap<String, String> = BTreeMap::new();
    for name in names {
        let Some((file_prefix, code)) = split_resource_name(&name) else {
            debug!("Ignoring {}: no locale code in file name", name);
            continue;
        };
        if file_prefix != prefix {
            debug!("Ignoring {}: prefix is not '{}'", name, prefix);
            continue;
        }

        let canonical = format!("{}_{}.{}", prefix, code, extension);
        match found.get(code) {
            Some(kept) if *kept == canonical || name != canonical => {
                warn!("Ignoring {}: locale '{}' already read from {}", name, code, kept);
            }
            Some(kept) => {
                warn!("Ignoring {}: locale '{}' already read from {}", kept, code, name);
                found.insert(code.to_string(), name.clone());
            }
            None => {
                found.insert(code.to_string(), name.clone());
            }
        }
    }

    Ok(found)
}
