//! Search and recommend against an index built by a full run.

use artvec::{DocumentId, IndexError, PipelineError, RunMode};

use crate::common::{Harness, football_articles};

#[test]
fn search_without_model_fails_before_touching_index() {
    let (harness, index) = Harness::new(football_articles());

    let err = harness
        .ctx
        .query_service()
        .search("football", 5)
        .unwrap_err();

    assert!(err.is_model_unavailable());
    assert_eq!(err.status_code(), "MODEL_UNAVAILABLE");
    assert_eq!(index.request_count(), 0);
}

#[test]
fn search_ranks_matching_article_first() {
    let (harness, _index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);

    let hits = harness
        .ctx
        .query_service()
        .search("penalty shootout in the cup", 3)
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, DocumentId::new(2));
    assert_eq!(hits[0].title, "Cup final");
    assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[test]
fn search_does_not_mutate_models_or_index() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);
    let fitted_at = harness.ctx.vectorizer.store().metadata().unwrap().fitted_at;
    let entries = index.ids();

    harness.ctx.query_service().search("derby", 10).unwrap();

    assert_eq!(
        harness.ctx.vectorizer.store().metadata().unwrap().fitted_at,
        fitted_at
    );
    assert_eq!(index.ids(), entries);
}

#[test]
fn recommend_without_profile_is_empty() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);
    let requests = index.request_count();

    let hits = harness.ctx.query_service().recommend(404, 5).unwrap();

    assert!(hits.is_empty());
    assert_eq!(index.request_count(), requests);
}

#[test]
fn recommend_uses_profile_vector_directly() {
    let (harness, index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);

    // A profile identical to one article's vector ranks that article first
    let profile = index.get(DocumentId::new(3)).unwrap().vector;
    harness.profiles.insert(7, profile);

    let hits = harness.ctx.query_service().recommend(7, 2).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, DocumentId::new(3));
    assert!((hits[0].score - 1.0).abs() < 1e-4);
}

#[test]
fn recommend_rejects_profile_of_wrong_width() {
    let (harness, _index) = Harness::new(football_articles());
    harness.pipeline().run(RunMode::Full);
    harness.profiles.insert(7, vec![0.1; 16]);

    let err = harness.ctx.query_service().recommend(7, 5).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Index(IndexError::InvalidVector {
            expected: 1000,
            actual: 16,
            ..
        })
    ));
}
