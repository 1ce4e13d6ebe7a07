//! Runs wired from settings with the file model store and JSON corpus.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use artvec::config::{CorpusBackend, IndexBackend};
use artvec::corpus::JsonCorpus;
use artvec::models::{FileModelStore, ModelStoreError};
use artvec::{DocumentId, IndexPipeline, PipelineContext, PipelineError, RunMode, Settings};
use tempfile::TempDir;

use crate::common::football_articles;

fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.models.path = dir.join("models");
    settings.corpus.backend = CorpusBackend::Json;
    settings.corpus.path = dir.join("articles.json");
    settings.index.backend = IndexBackend::Memory;
    settings.vectorize.min_df = 1;
    settings
}

fn append_article(path: &Path, id: i64, title: &str, content: &str) {
    let raw = fs::read_to_string(path).unwrap();
    let mut records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    records.push(serde_json::json!({
        "id": id,
        "title": title,
        "content": content,
        "created_at": "2024-03-02T09:30:00Z",
    }));
    fs::write(path, serde_json::to_string_pretty(&records).unwrap()).unwrap();
}

#[test]
fn fitted_models_and_flags_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    JsonCorpus::create(&settings.corpus.path, &football_articles()).unwrap();

    let first = Arc::new(PipelineContext::from_settings(&settings).unwrap());
    let report = IndexPipeline::new(first).run(RunMode::Full);
    assert_eq!(report.report().unwrap().written.len(), 5);
    assert!(dir.path().join("models").join("models.bin").exists());

    append_article(
        &settings.corpus.path,
        6,
        "Derby preview",
        "The striker expects a tight derby",
    );

    // Fresh process: same files, new in-memory index
    let second = Arc::new(PipelineContext::from_settings(&settings).unwrap());
    let outcome = IndexPipeline::new(Arc::clone(&second)).run(RunMode::Incremental);
    let report = outcome.report().unwrap();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.written, vec![DocumentId::new(6)]);
    assert_eq!(second.index.count().unwrap(), 1);

    let hits = second.query_service().search("derby striker", 3).unwrap();
    assert_eq!(hits[0].id, DocumentId::new(6));
}

#[test]
fn corrupt_artifact_is_reported_distinctly_from_missing() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(dir.path());
    JsonCorpus::create(&settings.corpus.path, &football_articles()).unwrap();

    let ctx = Arc::new(PipelineContext::from_settings(&settings).unwrap());
    let missing = ctx.query_service().search("derby", 3).unwrap_err();
    assert!(missing.is_model_unavailable());

    let store = FileModelStore::new(&settings.models.path);
    fs::create_dir_all(&settings.models.path).unwrap();
    fs::write(store.artifact_path(), b"not a model pair").unwrap();

    let err = ctx.query_service().search("derby", 3).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelStore(ModelStoreError::Corrupt { .. })
    ));
}

#[test]
fn invalid_settings_are_rejected_before_wiring() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(dir.path());
    settings.vectorize.floor_dims = settings.vectorize.target_dims + 1;

    let err = PipelineContext::from_settings(&settings).unwrap_err();
    assert!(matches!(err, PipelineError::Config { .. }));
}
