/*
 * Responsibility
 * - missions CRUD over a volatile in-memory table
 * - ids are assigned sequentially and never reused
 */
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionRow {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MissionTable {
    next_id: i64,
    rows: BTreeMap<i64, MissionRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MissionRepo {
    table: Arc<RwLock<MissionTable>>,
}

impl MissionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// All missions ordered by id.
    pub async fn list(&self) -> Vec<MissionRow> {
        self.table.read().await.rows.values().cloned().collect()
    }

    pub async fn create(&self, name: &str, status: &str) -> MissionRow {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let now = Utc::now();
        let row = MissionRow {
            id: table.next_id,
            name: name.to_string(),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        row
    }

    /// Applies the given fields; `None` keeps the current value. Returns `None` if absent.
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Option<MissionRow> {
        let mut table = self.table.write().await;
        let row = table.rows.get_mut(&id)?;
        if let Some(name) = name {
            row.name = name.to_string();
        }
        if let Some(status) = status {
            row.status = status.to_string();
        }
        row.updated_at = Utc::now();
        Some(row.clone())
    }

    pub async fn delete(&self, id: i64) -> bool {
        self.table.write().await.rows.remove(&id).is_some()
    }
}
