//! Postgres-backed corpus (feature `postgres`).

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};
use tracing::debug;

use super::{CorpusConnection, CorpusError, CorpusSource};
use crate::document::{Document, DocumentId, RunMode};

/// Reads approved articles from `table`.
///
/// Expected columns: `id bigint`, `title text`, `content text`,
/// `created_at timestamptz`, `moderation_status text`, `indexed boolean`.
#[derive(Debug, Clone)]
pub struct PostgresCorpus {
    url: String,
    table: String,
}

impl PostgresCorpus {
    /// Fails if `table` is not a plain (optionally schema-qualified)
    /// identifier, since it is interpolated into SQL.
    pub fn new(url: impl Into<String>, table: impl Into<String>) -> Result<Self, CorpusError> {
        let table = table.into();
        let valid = !table.is_empty()
            && table
                .split('.')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if !valid {
            return Err(CorpusError::Connection(format!("invalid table name '{table}'")));
        }
        Ok(Self {
            url: url.into(),
            table,
        })
    }
}

impl CorpusSource for PostgresCorpus {
    fn connect(&self) -> Result<Box<dyn CorpusConnection + '_>, CorpusError> {
        let client = Client::connect(&self.url, NoTls)
            .map_err(|e| CorpusError::Connection(e.to_string()))?;
        debug!(table = %self.table, "Connected to postgres corpus");
        Ok(Box::new(PostgresConnection {
            client,
            table: &self.table,
        }))
    }
}

struct PostgresConnection<'a> {
    client: Client,
    table: &'a str,
}


impl CorpusConnection for PostgresConnection<'_> {
    fn fetch_candidates(&mut self, mode: RunMode) -> Result<Vec<Document>, CorpusError> {
        let filter = match mode {
            RunMode::Full => "",
            RunMode::Incremental => " AND indexed = false",
        };
        let sql = format!(
            "SELECT id, title, content, created_at, indexed FROM {} \
             WHERE moderation_status = 'approved'{filter} ORDER BY id",
            self.table
        );
        let rows = self
            .client
            .query(sql.as_str(), &[])
            .map_err(|e| CorpusError::Query(e.to_string()))?;
        rows.iter().map(row_to_document).collect()
    }

    fn mark_indexed(&mut self, ids: &[DocumentId]) -> Result<u64, CorpusError> {
        let ids: Vec<i64> = ids.iter().map(DocumentId::get).collect();
        let sql = format!("UPDATE {} SET indexed = true WHERE id = ANY($1)", self.table);
        self.client
            .execute(sql.as_str(), &[&ids])
            .map_err(|e| CorpusError::Update(e.to_string()))
    }

    fn clear_all_indexed(&mut self) -> Result<u64, CorpusError> {
        let sql = format!("UPDATE {} SET indexed = false WHERE indexed = true", self.table);
        self.client
            .execute(sql.as_str(), &[])
            .map_err(|e| CorpusError::Update(e.to_string()))
    }
}

fn row_to_document(row: &Row) -> Result<Document, CorpusError> {
    let get_err = |e: postgres::Error| CorpusError::Query(e.to_string());
    Ok(Document {
        id: DocumentId::new(row.try_get::<_, i64>("id").map_err(get_err)?),
        title: row.try_get::<_, String>("title").map_err(get_err)?,
        body: row
            .try_get::<_, Option<String>>("content")
            .map_err(get_err)?
            .unwrap_or_default(),
        created_at: row
            .try_get::<_, DateTime<Utc>>("created_at")
            .map_err(get_err)?,
        indexed: row.try_get::<_, bool>("indexed").map_err(get_err)?,
    })
}
