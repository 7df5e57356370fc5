//! Base-language entries: the source strings every target locale is filled from.

use crate::store::LocaleResource;
use thiserror::Error;

/// Errors raised while assembling the base set. All of them are fatal and
/// happen before any request is sent.
#[derive(Debug, Error)]
pub enum BaseSetError {
    #[error("Invalid format for entry: '{0}'. Entries should be in the format 'key=value'.")]
    MalformedEntry(String),

    #[error("Base language resource not found: {0}")]
    MissingBaseResource(String),
}

/// A key plus its value in the base language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEntry {
    pub key: String,
    pub value: String,
}

/// Where the base set came from. Explicit entries are also written back to
/// the base-language resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    Explicit,
    Resource,
}

/// Ordered, immutable set of base entries for one run.
#[derive(Debug, Clone)]
pub struct BaseSet {
    language: String,
    source: BaseSource,
    entries: Vec<BaseEntry>,
}

impl BaseSet {
    /// Parse `key=value` pairs. The value may itself contain `=`.
    ///
    /// A later pair with the same key replaces the earlier value but keeps
    /// the earlier position.
    pub fn from_pairs<S: AsRef<str>>(language: &str, pairs: &[S]) -> Result<Self, BaseSetError> {
        let mut entries: Vec<BaseEntry> = Vec::with_capacity(pairs.len());

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| BaseSetError::MalformedEntry(pair.to_string()))?;
            if key.is_empty() {
                return Err(BaseSetError::MalformedEntry(pair.to_string()));
            }

            match entries.iter_mut().find(|e| e.key == key) {
                Some(existing) => existing.value = value.to_string(),
                None => entries.push(BaseEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
        }

        Ok(Self {
            language: language.to_string(),
            source: BaseSource::Explicit,
            entries,
        })
    }

    /// Take every translatable string of an existing base-language resource.
    /// Metadata keys (`@...`) and non-string values are left out.
    pub fn from_resource(resource: &LocaleResource) -> Self {
        let entries = resource
            .translatable()
            .map(|(key, value)| BaseEntry {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();

        Self {
            language: resource.locale().to_string(),
            source: BaseSource::Resource,
            entries,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> BaseSource {
        self.source
    }

    pub fn entries(&self) -> &[BaseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
