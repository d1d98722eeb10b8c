use super::{Upsert, UpsertRequest};
use crate::record::Record;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::trace;

/// In-process tables with the same conflict-ignore semantics as [`super::PgStore`].
///
/// A table is created by its first upsert; later upserts must use the same columns and key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

#[derive(Debug)]
struct Table {
    columns: Vec<String>,
    key: Vec<String>,
    keys: HashSet<String>,
    rows: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `table` in insertion order; empty when the table does not exist.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }
}

#[async_trait]
impl Upsert for MemoryStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let table = tables
            .entry(request.table().to_string())
            .or_insert_with(|| Table {
                columns: request.columns().to_vec(),
                key: request.key().to_vec(),
                keys: HashSet::new(),
                rows: Vec::new(),
            });

        if table.columns != request.columns() || table.key != request.key() {
            return Err(Error::Schema(format!(
                "{} has columns {:?} keyed on {:?}",
                request.table(),
                table.columns,
                table.key
            )));
        }

        let mut inserted = 0;
        for record in request.records() {
            let key = request
                .key_of(record)
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            if !table.keys.insert(key) {
                trace!("{} already holds this key, skipped", request.table());
                continue;
            }
            table.rows.push(record.clone());
            inserted += 1;
        }

        Ok(inserted)
    }
}
