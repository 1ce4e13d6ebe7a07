//! End-to-end Full and Incremental runs over in-memory backends.

use std::sync::Arc;

use artvec::{DocumentId, ModelStore, PipelineError, RunMode, RunOutcome, VectorIndex};

use crate::common::{FailingIndex, Harness, article, football_articles};

fn ids(raw: &[i64]) -> Vec<DocumentId> {
    raw.iter().copied().map(DocumentId::new).collect()
}

#[test]
fn full_run_pads_small_vocabulary_to_index_width() {
    let (harness, index) = Harness::new(vec![
        article(1, "Derby", "goal derby"),
        article(2, "Final", "goal final striker"),
        article(3, "Keeper", "striker keeper"),
    ]);

    let outcome = harness.pipeline().run(RunMode::Full);
    let report = outcome.report().expect("full run completes");

    let pair = harness.models.load().unwrap();
    assert_eq!(pair.metadata.vocabulary_size, 5);
    assert_eq!(report.reduction_width, 50);
    assert_eq!(report.padding, 950);

    for id in ids(&[1, 2, 3]) {
        let entry = index.get(id).expect("entry written");
        assert_eq!(entry.vector.len(), 1000);
        assert!(entry.vector[50..].iter().all(|v| *v == 0.0));
    }
}

#[test]
fn incremental_run_with_no_candidates_touches_nothing() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);

    let requests_before = index.request_count();
    let updates_before = harness.corpus.update_statements();

    let outcome = harness.pipeline().run(RunMode::Incremental);
    let report = outcome.report().expect("incremental run completes");

    assert_eq!(report.candidates, 0);
    assert!(report.written.is_empty());
    assert_eq!(index.request_count(), requests_before);
    assert_eq!(harness.corpus.update_statements(), updates_before);
}

#[test]
fn failed_write_is_isolated_and_left_unflagged() {
    let index = Arc::new(FailingIndex::rejecting(&[3]));
    let harness = Harness::with_index(football_articles(), index.clone());

    let outcome = harness.pipeline().run(RunMode::Full);
    let report = outcome.report().expect("run completes despite one failure");

    assert_eq!(report.written.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, DocumentId::new(3));

    assert_eq!(harness.corpus.indexed_ids(), ids(&[1, 2, 4, 5]));
    assert_eq!(index.inner.ids(), ids(&[1, 2, 4, 5]));
}

#[test]
fn full_run_replaces_everything_from_before() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);
    assert_eq!(index.count().unwrap(), 5);

    // Article 2 is taken down and a new one arrives before the next rebuild
    let mut withdrawn = harness.corpus.get(DocumentId::new(2)).unwrap();
    withdrawn.indexed = true;
    harness.corpus.insert_hidden(withdrawn);
    harness
        .corpus
        .insert(article(6, "Manager sacked", "The club sacked the manager after the derby"));

    let outcome = harness.pipeline().run(RunMode::Full);
    let report = outcome.report().unwrap();

    assert_eq!(report.cleared, 5);
    assert_eq!(index.ids(), ids(&[1, 3, 4, 5, 6]));
    assert!(!harness.corpus.get(DocumentId::new(2)).unwrap().indexed);
    assert_eq!(harness.corpus.indexed_ids(), ids(&[1, 3, 4, 5, 6]));
}

#[test]
fn full_run_with_nothing_eligible_empties_the_index() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);
    let fitted_at = harness.models.metadata().unwrap().fitted_at;

    // Moderation takes every article down
    for mut doc in football_articles() {
        doc.indexed = true;
        harness.corpus.insert_hidden(doc);
    }

    let outcome = harness.pipeline().run(RunMode::Full);
    let report = outcome.report().expect("full run completes");

    assert_eq!(report.candidates, 0);
    assert_eq!(report.cleared, 5);
    assert!(report.written.is_empty());
    assert_eq!(index.count().unwrap(), 0);
    assert!(harness.corpus.indexed_ids().is_empty());
    assert!(harness.ctx.query_service().search("derby striker", 5).unwrap().is_empty());

    // Nothing to fit, so the previous pair stays
    assert_eq!(harness.models.metadata().unwrap().fitted_at, fitted_at);
}

#[test]
fn full_run_keeps_previous_models_when_index_cannot_be_cleared() {
    let index = Arc::new(FailingIndex::failing_clear());
    let harness = Harness::with_index(football_articles(), index.clone());
    assert!(!harness.models.exists());

    let outcome = harness.pipeline().run(RunMode::Full);

    assert!(matches!(
        outcome,
        RunOutcome::Failed(PipelineError::Index(_))
    ));
    assert!(!harness.models.exists());
    assert!(harness.corpus.indexed_ids().is_empty());
    assert_eq!(index.inner.count().unwrap(), 0);
}

#[test]
fn incremental_run_flags_exactly_what_it_wrote() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);

    harness
        .corpus
        .insert(article(6, "Derby preview", "The striker expects a tight derby"));
    harness
        .corpus
        .insert(article(7, "Cup draw", "The club drew a league side in the cup"));

    let outcome = harness.pipeline().run(RunMode::Incremental);
    let report = outcome.report().unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.written, ids(&[6, 7]));
    assert_eq!(report.cleared, 0);
    assert_eq!(harness.corpus.indexed_ids(), ids(&[1, 2, 3, 4, 5, 6, 7]));
    assert_eq!(index.count().unwrap(), 7);
}

#[test]
fn incremental_run_skips_already_indexed_documents() {
    let index = Arc::new(FailingIndex::rejecting(&[2]));
    let harness = Harness::with_index(football_articles(), index.clone());
    harness.pipeline().run(RunMode::Full);
    assert!(harness.corpus.get(DocumentId::new(2)).is_some_and(|doc| !doc.indexed));

    harness.corpus.insert(article(6, "Derby preview", "A tight derby is expected"));
    let outcome = harness.pipeline().run(RunMode::Incremental);
    let report = outcome.report().unwrap();

    // Only the unflagged documents come back as candidates
    assert_eq!(report.candidates, 2);
    assert_eq!(report.written, ids(&[6]));
    assert_eq!(report.failed[0].id, DocumentId::new(2));
    assert_eq!(harness.corpus.indexed_ids(), ids(&[1, 3, 4, 5, 6]));
}

#[test]
fn incremental_vectors_share_the_fitted_padding() {
    let (harness, index) = Harness::new(football_articles());
    let full = harness.pipeline().run(RunMode::Full);
    let full_padding = full.report().unwrap().padding;
    let width = full.report().unwrap().reduction_width;
    assert_eq!(full_padding, 1000 - width);

    harness.corpus.insert(article(6, "Short", "derby"));
    let incremental = harness.pipeline().run(RunMode::Incremental);
    assert_eq!(incremental.report().unwrap().padding, full_padding);

    let entry = index.get(DocumentId::new(6)).unwrap();
    assert_eq!(entry.vector.len(), 1000);
    assert!(entry.vector[width..].iter().all(|v| *v == 0.0));

    let query = harness.ctx.vectorizer.transform_query("derby striker").unwrap();
    assert_eq!(query.len(), 1000);
    assert!(query[width..].iter().all(|v| *v == 0.0));
}

#[test]
fn incremental_run_without_model_fails_without_side_effects() {
    let (harness, index) = Harness::new(football_articles());

    let outcome = harness.pipeline().run(RunMode::Incremental);

    assert!(matches!(
        outcome,
        RunOutcome::Failed(PipelineError::ModelUnavailable { .. })
    ));
    assert_eq!(index.request_count(), 0);
    assert!(harness.corpus.indexed_ids().is_empty());
    assert_eq!(harness.corpus.open_connections(), 0);
    assert!(!harness.ctx.coordinator.is_running());
}

#[test]
fn unreachable_index_mid_run_flags_only_completed_writes() {
    let index = Arc::new(FailingIndex::unreachable_after(2));
    let harness = Harness::with_index(football_articles(), index.clone());

    let outcome = harness.pipeline().run(RunMode::Full);

    match outcome {
        RunOutcome::Failed(PipelineError::Index(err)) => assert!(err.is_transport()),
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(harness.corpus.indexed_ids(), ids(&[1, 2]));
    assert_eq!(index.inner.ids(), ids(&[1, 2]));
    assert_eq!(harness.corpus.open_connections(), 0);
}

#[test]
fn unreachable_corpus_fails_run_and_releases_token() {
    let (harness, index) = Harness::new(football_articles());
    harness.corpus.set_unreachable(true);

    let outcome = harness.pipeline().run(RunMode::Full);
    assert!(matches!(outcome, RunOutcome::Failed(PipelineError::Corpus(_))));
    assert_eq!(index.request_count(), 0);
    assert!(!harness.ctx.coordinator.is_running());

    harness.corpus.set_unreachable(false);
    assert!(harness.pipeline().run(RunMode::Full).report().is_some());
}

#[test]
fn each_run_opens_and_releases_one_connection() {
    let (harness, _index) = Harness::new(football_articles());

    harness.pipeline().run(RunMode::Full);
    harness.pipeline().run(RunMode::Incremental);

    assert_eq!(harness.corpus.connections_opened(), 2);
    assert_eq!(harness.corpus.open_connections(), 0);
}
