//! Command-line interface.

use crate::base::{BaseSet, BaseSetError};
use crate::config::Config;
use crate::conversation::ContextMode;
use crate::orchestrator::TranslateOptions;
use crate::store::{self, ResourceStore};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "arb-translate")]
#[command(about = "Translate missing entries into multiple languages and update .arb files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Input directory containing resource files
    #[arg(long, default_value = ".")]
    pub indir: PathBuf,

    /// Output directory for updated resource files (defaults to indir)
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Key-value pairs to add in the form key=value. Without this, every
    /// entry of the base-language resource is used
    #[arg(long, num_args = 1..)]
    pub entries: Vec<String>,

    /// Language of the input text
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Languages to translate into (defaults to every resource found in indir)
    #[arg(long = "out-langs", num_args = 1..)]
    pub out_langs: Vec<String>,

    /// Model to use for translations (overrides OPENAI_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Entries written per batch (overrides TRANSLATE_BATCH_SIZE)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub batch_size: Option<u16>,

    /// Resource file name prefix
    #[arg(long, default_value = "app")]
    pub prefix: String,

    /// Resource file extension
    #[arg(long, default_value = "arb")]
    pub ext: String,

    /// Send every request with the full history of earlier requests
    #[arg(long)]
    pub shared_context: bool,

    /// Re-translate every base entry, replacing translations a locale
    /// already has
    #[arg(long)]
    pub overwrite: bool,
}

impl Cli {
    pub fn store(&self) -> ResourceStore {
        let outdir = self.outdir.clone().unwrap_or_else(|| self.indir.clone());
        ResourceStore::new(&self.indir, outdir)
            .with_prefix(&self.prefix)
            .with_extension(&self.ext)
    }

    /// Explicit entries when given, otherwise the whole base-language
    /// resource, which must exist.
    pub fn base_set(&self, store: &ResourceStore) -> Result<BaseSet> {
        if !self.entries.is_empty() {
            return Ok(BaseSet::from_pairs(&self.lang, &self.entries)?);
        }

        let path = store.input_path(&self.lang);
        if !path.is_file() {
            return Err(BaseSetError::MissingBaseResource(path.display().to_string()).into());
        }
        let resource = store::load(&path, &self.lang)
            .with_context(|| format!("Failed to load base resource {}", path.display()))?;

        Ok(BaseSet::from_resource(&resource))
    }

    /// Explicit target languages, or every locale found in the input
    /// directory. Discovered locales are written back to the files they
    /// were found in.
    pub fn targets(&self, store: &mut ResourceStore) -> Result<Vec<String>> {
        if !self.out_langs.is_empty() {
            return Ok(self.out_langs.clone());
        }

        let locales = store.discover().with_context(|| {
            format!(
                "Failed to list resource files in {}",
                store.input_dir().display()
            )
        })?;
        if locales.is_empty() {
            bail!(
                "No .{} files found in {} and no --out-langs given",
                store.extension(),
                store.input_dir().display()
            );
        }
        Ok(locales)
    }

    pub fn translate_options(&self, config: &Config) -> TranslateOptions {
        TranslateOptions {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| config.openai_model.clone()),
            batch_size: self
                .batch_size
                .map(usize::from)
                .unwrap_or(config.batch_size),
            context_mode: if self.shared_context {
                ContextMode::Shared
            } else {
                ContextMode::Isolated
            },
            overwrite: self.overwrite,
        }
    }
}
