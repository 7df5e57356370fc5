//! Drives translation of every target locale.
//!
//! Each locale moves through `Planning -> Translating <-> Flushing -> Done`.
//! Translations accumulate in a pending batch that is merged into the
//! locale's resource whenever it reaches the batch size, and once more when
//! the backlog runs out. An interrupted run therefore loses at most one
//! partial batch; the next run plans whatever is still missing.

use crate::base::{BaseSet, BaseSource};
use crate::client::{CompletionClient, CompletionOutcome};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::conversation::{build_translation_prompt, ContextMode, ConversationContext};
use crate::planner;
use crate::store::{ResourceStore, StoreError};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub model: String,
    pub batch_size: usize,
    pub context_mode: ContextMode,
    /// Re-translate base keys that the target already holds
    pub overwrite: bool,
}

impl TranslateOptions {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            context_mode: ContextMode::Isolated,
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Translating,
    Flushing,
    Done,
}

/// What happened to one locale during a run.
#[derive(Debug, Clone, Default)]
pub struct LocaleReport {
    pub locale: String,
    pub planned: usize,
    /// Translations that reached the resource file
    pub translated: usize,
    pub skipped: Vec<String>,
    /// Size of each batch written, in order
    pub flushes: Vec<usize>,
    pub persistence_error: Option<String>,
}

impl LocaleReport {
    fn new(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            ..Default::default()
        }
    }

    fn fail(&mut self, err: &StoreError) {
        error!("Persistence failed for locale '{}': {}", self.locale, err);
        self.persistence_error = Some(err.to_string());
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub locales: Vec<LocaleReport>,
}

impl RunReport {
    pub fn locale(&self, locale: &str) -> Option<&LocaleReport> {
        self.locales.iter().find(|r| r.locale == locale)
    }

    pub fn total_translated(&self) -> usize {
        self.locales.iter().map(|r| r.translated).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.locales.iter().map(|r| r.skipped.len()).sum()
    }

    pub fn failed_locales(&self) -> Vec<&str> {
        self.locales
            .iter()
            .filter(|r| r.persistence_error.is_some())
            .map(|r| r.locale.as_str())
            .collect()
    }

    pub fn log_summary(&self) {
        for r in &self.locales {
            info!(
                "{}: {} planned, {} translated, {} skipped, {} batches written",
                r.locale,
                r.planned,
                r.translated,
                r.skipped.len(),
                r.flushes.len()
            );
            if !r.skipped.is_empty() {
                warn!("{}: untranslated keys {:?}", r.locale, r.skipped);
            }
        }
        info!(
            "Run complete: {} translated, {} skipped, {} locale(s) failed to persist",
            self.total_translated(),
            self.total_skipped(),
            self.failed_locales().len()
        );
    }
}

pub struct Orchestrator<C> {
    client: C,
    store: ResourceStore,
    options: TranslateOptions,
}

impl<C: CompletionClient> Orchestrator<C> {
    pub fn new(client: C, store: ResourceStore, options: TranslateOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Translate the base set into every target locale, one locale at a time.
    /// The base language itself is never a target.
    pub async fn run(&self, base: &BaseSet, targets: &[String]) -> RunReport {
        let mut report = RunReport::default();

        if base.source() == BaseSource::Explicit {
            if let Some(base_report) = self.write_base_entries(base) {
                report.locales.push(base_report);
            }
        }

        let mut context = ConversationContext::new(self.options.context_mode);
        let mut seen: Vec<&str> = Vec::new();

        for locale in targets {
            if locale == base.language() {
                debug!("Skipping base language '{}' as a target", locale);
                continue;
            }
            if seen.contains(&locale.as_str()) {
                continue;
            }
            seen.push(locale);

            let locale_report = self.process_locale(base, locale, &mut context).await;
            report.locales.push(locale_report);
        }

        report
    }

    /// Explicit entries are also added to the base-language resource. They
    /// show up as a flush, never as translations.
    fn write_base_entries(&self, base: &BaseSet) -> Option<LocaleReport> {
        if base.is_empty() {
            return None;
        }

        let entries: BTreeMap<String, String> = base
            .entries()
            .iter()
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect();

        let mut report = LocaleReport::new(base.language());
        match self.store.merge(base.language(), &entries) {
            Ok(_) => report.flushes.push(entries.len()),
            Err(e) => report.fail(&e),
        }
        Some(report)
    }

    async fn process_locale(
        &self,
        base: &BaseSet,
        locale: &str,
        context: &mut ConversationContext,
    ) -> LocaleReport {
        let mut report = LocaleReport::new(locale);

        let existing = match self.store.load(locale) {
            Ok(resource) => resource,
            Err(e) => {
                report.fail(&e);
                return report;
            }
        };

        let batch_size = self.options.batch_size.max(1);
        let backlog = planner::plan(base, &existing, self.options.overwrite);
        let mut pending: BTreeMap<String, String> = BTreeMap::new();
        let mut next = 0;
        let mut phase = Phase::Planning;

        loop {
            phase = match phase {
                Phase::Planning => {
                    report.planned = backlog.len();
                    if backlog.is_empty() {
                        info!("{}: nothing to translate", locale);
                        Phase::Done
                    } else {
                        info!("{}: {} entries to translate", locale, backlog.len());
                        Phase::Translating
                    }
                }
                Phase::Translating => match backlog.entries().get(next) {
                    None if pending.is_empty() => Phase::Done,
                    None => Phase::Flushing,
                    Some(entry) => {
                        next += 1;

                        let prompt =
                            build_translation_prompt(&entry.value, base.language(), locale);
                        let messages = context.push_request(prompt);

                        match self.client.translate(messages, &self.options.model).await {
                            CompletionOutcome::Translated(text) => {
                                debug!("{}: '{}' -> {:?}", locale, entry.key, text);
                                pending.insert(entry.key.clone(), text);
                            }
                            CompletionOutcome::FormatMismatch(reason) => {
                                warn!(
                                    "{}: skipping '{}', no structured answer ({})",
                                    locale, entry.key, reason
                                );
                                report.skipped.push(entry.key.clone());
                            }
                            CompletionOutcome::Transient(reason)
                            | CompletionOutcome::Fatal(reason) => {
                                warn!(
                                    "{}: skipping '{}' after failed request ({})",
                                    locale, entry.key, reason
                                );
                                report.skipped.push(entry.key.clone());
                            }
                        }

                        if pending.len() >= batch_size {
                            Phase::Flushing
                        } else {
                            Phase::Translating
                        }
                    }
                },
                Phase::Flushing => match self.store.merge(locale, &pending) {
                    Ok(_) => {
                        report.translated += pending.len();
                        report.flushes.push(pending.len());
                        pending.clear();
                        if next < backlog.len() {
                            Phase::Translating
                        } else {
                            Phase::Done
                        }
                    }
                    Err(e) => {
                        warn!("{}: {} translations were not written", locale, pending.len());
                        report.fail(&e);
                        Phase::Done
                    }
                },
                Phase::Done => break,
            };
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted client: translates by upper-casing unless the text is listed
    /// as failing. Records the size of every context it receives.
    #[derive(Default)]
    struct ScriptedClient {
        fail_on: Vec<String>,
        context_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedClient {
        fn failing(texts: &[&str]) -> Self {
            Self {
                fail_on: texts.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.context_sizes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn translate(&self, messages: &[Message], _model: &str) -> CompletionOutcome {
            self.context_sizes.lock().unwrap().push(messages.len());

            let prompt = &messages.last().unwrap().content;
            let text = prompt.split('"').nth(1).unwrap_or_default();
            if self.fail_on.iter().any(|f| f == text) {
                return CompletionOutcome::Transient("scripted failure".to_string());
            }
            CompletionOutcome::Translated(text.to_uppercase())
        }
    }

    fn base_of(n: usize) -> BaseSet {
        let pairs: Vec<String> = (0..n).map(|i| format!("key{:02}=text {}", i, i)).collect();
        BaseSet::from_pairs("en", &pairs).unwrap()
    }

    fn options(batch_size: usize) -> TranslateOptions {
        TranslateOptions {
            batch_size,
            ..TranslateOptions::new("test-model")
        }
    }

    fn read_json(dir: &TempDir, locale: &str) -> serde_json::Value {
        let path = dir.path().join(format!("app_{}.arb", locale));
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn targets(locales: &[&str]) -> Vec<String> {
        locales.iter().map(|l| l.to_string()).collect()
    }

    // ==================== Batching Tests ====================

    #[tokio::test]
    async fn test_twelve_keys_flush_in_three_batches() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let report = orchestrator
            .run(&BaseSet::from_resource(&to_resource(&base_of(12))), &targets(&["fr"]))
            .await;

        let fr = report.locale("fr").unwrap();
        assert_eq!(fr.flushes, vec![5, 5, 2]);
        assert_eq!(fr.translated, 12);
        assert_eq!(read_json(&dir, "fr").as_object().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_exact_multiple_of_batch_size_has_no_empty_flush() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let report = orchestrator
            .run(&BaseSet::from_resource(&to_resource(&base_of(10))), &targets(&["fr"]))
            .await;

        assert_eq!(report.locale("fr").unwrap().flushes, vec![5, 5]);
    }

    #[tokio::test]
    async fn test_failed_entries_do_not_count_toward_batch() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::failing(&["text 1", "text 2"]),
            ResourceStore::new(dir.path(), dir.path()),
            options(2),
        );

        let report = orchestrator
            .run(&BaseSet::from_resource(&to_resource(&base_of(5))), &targets(&["fr"]))
            .await;

        let fr = report.locale("fr").unwrap();
        assert_eq!(fr.flushes, vec![2, 1]);
        assert_eq!(fr.skipped, vec!["key01", "key02"]);
    }

    // ==================== Skip And Resume Tests ====================

    #[tokio::test]
    async fn test_failed_key_is_absent_and_replanned() {
        let dir = TempDir::new().unwrap();
        let base = base_of(3);
        let store = ResourceStore::new(dir.path(), dir.path());

        let first = Orchestrator::new(
            ScriptedClient::failing(&["text 1"]),
            store.clone(),
            options(5),
        );
        let report = first.run(&base, &targets(&["de"])).await;
        assert_eq!(report.locale("de").unwrap().skipped, vec!["key01"]);

        let de = store.load("de").unwrap();
        assert!(de.contains_key("key00"));
        assert!(!de.contains_key("key01"));
        assert!(de.contains_key("key02"));

        // Next run picks up only the missing key
        let second = Orchestrator::new(ScriptedClient::default(), store.clone(), options(5));
        let report = second.run(&base, &targets(&["de"])).await;

        let de_report = report.locale("de").unwrap();
        assert_eq!(de_report.planned, 1);
        assert_eq!(second.client.calls(), 1);
        assert_eq!(store.load("de").unwrap().get_str("key01"), Some("TEXT 1"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let base = BaseSet::from_resource(&to_resource(&base_of(7)));
        let store = ResourceStore::new(dir.path(), dir.path());

        let first = Orchestrator::new(ScriptedClient::default(), store.clone(), options(5));
        first.run(&base, &targets(&["fr", "es"])).await;
        let fr_before = std::fs::read_to_string(dir.path().join("app_fr.arb")).unwrap();
        let es_before = std::fs::read_to_string(dir.path().join("app_es.arb")).unwrap();

        let second = Orchestrator::new(ScriptedClient::default(), store, options(5));
        let report = second.run(&base, &targets(&["fr", "es"])).await;

        assert_eq!(second.client.calls(), 0);
        assert!(report.locales.iter().all(|r| r.planned == 0 && r.flushes.is_empty()));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app_fr.arb")).unwrap(),
            fr_before
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app_es.arb")).unwrap(),
            es_before
        );
    }

    #[tokio::test]
    async fn test_empty_backlog_writes_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app_fr.arb"), r#"{"key00": "déjà"}"#).unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(1)));
        let report = orchestrator.run(&base, &targets(&["fr"])).await;

        assert!(report.locale("fr").unwrap().flushes.is_empty());
        assert_eq!(orchestrator.client.calls(), 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app_fr.arb")).unwrap(),
            r#"{"key00": "déjà"}"#
        );
    }

    #[tokio::test]
    async fn test_overwrite_retranslates_existing_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app_fr.arb"), r#"{"key00": "old"}"#).unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            TranslateOptions {
                overwrite: true,
                ..options(5)
            },
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(1)));
        orchestrator.run(&base, &targets(&["fr"])).await;

        assert_eq!(read_json(&dir, "fr")["key00"], "TEXT 0");
    }

    // ==================== Target Selection Tests ====================

    #[tokio::test]
    async fn test_base_language_is_not_a_target() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(2)));
        let report = orchestrator.run(&base, &targets(&["en", "fr", "fr"])).await;

        assert_eq!(report.locales.len(), 1);
        assert_eq!(report.locales[0].locale, "fr");
        assert_eq!(orchestrator.client.calls(), 2);
    }

    #[tokio::test]
    async fn test_explicit_entries_are_written_to_base_resource() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app_en.arb"), r#"{"existing": "Hi"}"#).unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_pairs("en", &["save=Save"]).unwrap();
        orchestrator.run(&base, &targets(&["fr"])).await;

        assert_eq!(
            read_json(&dir, "en"),
            serde_json::json!({"existing": "Hi", "save": "Save"})
        );
        assert_eq!(read_json(&dir, "fr"), serde_json::json!({"save": "SAVE"}));
    }

    #[tokio::test]
    async fn test_base_write_is_not_counted_as_translation() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_pairs("en", &["save=Save", "open=Open"]).unwrap();
        let report = orchestrator.run(&base, &targets(&["fr"])).await;

        let en = report.locale("en").unwrap();
        assert_eq!(en.translated, 0);
        assert_eq!(en.flushes, vec![2]);
        assert_eq!(report.total_translated(), 2);
    }

    // ==================== Context Tests ====================

    #[tokio::test]
    async fn test_isolated_context_stays_constant() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(3)));
        orchestrator.run(&base, &targets(&["fr", "de"])).await;

        let sizes = orchestrator.client.context_sizes.lock().unwrap().clone();
        assert_eq!(sizes, vec![2; 6]);
    }

    #[tokio::test]
    async fn test_shared_context_grows_across_locales() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            TranslateOptions {
                context_mode: ContextMode::Shared,
                ..options(5)
            },
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(2)));
        orchestrator.run(&base, &targets(&["fr", "de"])).await;

        let sizes = orchestrator.client.context_sizes.lock().unwrap().clone();
        assert_eq!(sizes, vec![2, 3, 4, 5]);
    }

    // ==================== Persistence Failure Tests ====================

    #[tokio::test]
    async fn test_persistence_failure_moves_on_to_next_locale() {
        let dir = TempDir::new().unwrap();
        // A directory where the French file should go makes every write fail
        std::fs::create_dir(dir.path().join("app_fr.arb")).unwrap();

        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(2)));
        let report = orchestrator.run(&base, &targets(&["fr", "de"])).await;

        assert_eq!(report.failed_locales(), vec!["fr"]);
        // The lost batch is not reported as translated
        assert_eq!(report.locale("fr").unwrap().translated, 0);
        assert_eq!(report.total_translated(), 2);
        assert_eq!(report.locale("de").unwrap().flushes, vec![2]);
        assert_eq!(read_json(&dir, "de").as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_resource_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app_fr.arb"), "not json").unwrap();

        let orchestrator = Orchestrator::new(
            ScriptedClient::default(),
            ResourceStore::new(dir.path(), dir.path()),
            options(5),
        );

        let base = BaseSet::from_resource(&to_resource(&base_of(2)));
        let report = orchestrator.run(&base, &targets(&["fr", "de"])).await;

        assert_eq!(report.failed_locales(), vec!["fr"]);
        assert_eq!(orchestrator.client.calls(), 2);
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_run_report_totals() {
        let report = RunReport {
            locales: vec![
                LocaleReport {
                    locale: "fr".to_string(),
                    translated: 3,
                    skipped: vec!["a".to_string()],
                    ..Default::default()
                },
                LocaleReport {
                    locale: "de".to_string(),
                    translated: 2,
                    persistence_error: Some("disk full".to_string()),
                    ..Default::default()
                },
            ],
        };

        assert_eq!(report.total_translated(), 5);
        assert_eq!(report.total_skipped(), 1);
        assert_eq!(report.failed_locales(), vec!["de"]);
    }

    /// Base set in resource mode so no base-language file is written
    fn to_resource(base: &BaseSet) -> crate::store::LocaleResource {
        let map: serde_json::Map<String, serde_json::Value> = base
            .entries()
            .iter()
            .map(|e| (e.key.clone(), serde_json::Value::String(e.value.clone())))
            .collect();
        crate::store::LocaleResource::from_value("en", serde_json::Value::Object(map)).unwrap()
    }
}
