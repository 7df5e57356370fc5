//! Work planning: which base entries still need translating for a locale.

use crate::base::{BaseEntry, BaseSet};
use crate::store::LocaleResource;

/// Base entries missing from one target locale, in base-set order.
#[derive(Debug, Clone)]
pub struct TranslationBacklog<'a> {
    locale: String,
    entries: Vec<&'a BaseEntry>,
}

impl<'a> TranslationBacklog<'a> {
    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn entries(&self) -> &[&'a BaseEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.entries.iter().copied().map(|e: &'a BaseEntry| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every base key absent from `existing`. With `overwrite` set, every base
/// key is planned regardless of what the target already holds.
pub fn plan<'a>(
    base: &'a BaseSet,
    existing: &LocaleResource,
    overwrite: bool,
) -> TranslationBacklog<'a> {
    let entries = base
        .entries()
        .iter()
        .filter(|entry| overwrite || !existing.contains_key(&entry.key))
        .collect();

    TranslationBacklog {
        locale: existing.locale().to_string(),
        entries,
    }
}
