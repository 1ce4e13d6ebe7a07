//! Process-wide handles shared by runs and queries.
//!
//! Built once at startup and passed to each operation instead of living in
//! globals.

use std::sync::Arc;

use tracing::debug;

use crate::config::{CorpusBackend, IndexBackend, Settings};
use crate::corpus::{CorpusSource, JsonCorpus};
use crate::error::PipelineError;
use crate::index::{ElasticIndex, MemoryVectorIndex, VectorIndex};
use crate::jobs::JobCoordinator;
use crate::models::{FileModelStore, ModelStore};
use crate::query::{MemoryProfileStore, ProfileStore, QueryService};
use crate::vector::{VectorizeParams, Vectorizer};

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub vectorizer: Vectorizer,
    pub index: Arc<dyn VectorIndex>,
    pub corpus: Arc<dyn CorpusSource>,
    pub profiles: Arc<dyn ProfileStore>,
    pub coordinator: Arc<JobCoordinator>,
    pub num_candidates: usize,
}

impl PipelineContext {
    pub fn new(
        params: VectorizeParams,
        models: Arc<dyn ModelStore>,
        index: Arc<dyn VectorIndex>,
        corpus: Arc<dyn CorpusSource>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            vectorizer: Vectorizer::new(params, models),
            index,
            corpus,
            profiles,
            coordinator: Arc::new(JobCoordinator::new()),
            num_candidates: 100,
        }
    }

    /// Sets the ANN candidate pool size.
    #[must_use]
    pub fn with_num_candidates(mut self, num_candidates: usize) -> Self {
        self.num_candidates = num_candidates;
        self
    }

    /// Wires backends as configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let params = settings.vectorize.params()?;
        let models: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(&settings.models.path));

        let (index, profiles): (Arc<dyn VectorIndex>, Arc<dyn ProfileStore>) =
            match settings.index.backend {
                IndexBackend::Elasticsearch => {
                    let elastic = Arc::new(ElasticIndex::new(
                        &settings.index.url,
                        settings.index.name.clone(),
                        settings.index.profile_index.clone(),
                        settings.index.timeout(),
                        settings.index.max_retries,
                    )?);
                    let index: Arc<dyn VectorIndex> = elastic.clone();
                    let profiles: Arc<dyn ProfileStore> = elastic;
                    (index, profiles)
                }
                IndexBackend::Memory => {
                    let index: Arc<dyn VectorIndex> =
                        Arc::new(MemoryVectorIndex::new(settings.index.name.clone()));
                    let profiles: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
                    (index, profiles)
                }
            };

        let corpus = corpus_from_settings(settings)?;
        debug!(
            index = ?settings.index.backend,
            corpus = ?settings.corpus.backend,
            "Pipeline context ready"
        );

        Ok(Self::new(params, models, index, corpus, profiles)
            .with_num_candidates(settings.index.num_candidates))
    }

    /// Query service sharing this context's handles.
    pub fn query_service(&self) -> QueryService {
        QueryService::new(
            self.vectorizer.clone(),
            Arc::clone(&self.index),
            Arc::clone(&self.profiles),
            self.num_candidates,
        )
    }
}

fn corpus_from_settings(settings: &Settings) -> Result<Arc<dyn CorpusSource>, PipelineError> {
    match settings.corpus.backend {
        CorpusBackend::Json => Ok(Arc::new(JsonCorpus::new(&settings.corpus.path))),
        #[cfg(feature = "postgres")]
        CorpusBackend::Postgres => {
            let url = settings
                .corpus
                .url
                .clone()
                .ok_or_else(|| PipelineError::Config {
                    reason: "corpus.url is required for the postgres backend".to_string(),
                })?;
            Ok(Arc::new(crate::corpus::PostgresCorpus::new(
                url,
                settings.corpus.table.clone(),
            )?))
        }
        #[cfg(not(feature = "postgres"))]
        CorpusBackend::Postgres => Err(PipelineError::Config {
            reason: "the postgres corpus backend requires building with --features postgres"
                .to_string(),
        }),
    }
}
