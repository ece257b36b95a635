//! 메모리 저장소
//!
//! 테스트와 CLI 점검용 `RecordStore` 구현입니다. `ID`는 테이블별
//! auto increment로 발급합니다.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::RecordStore;
use crate::permissions::{Identifier, PRIMARY_KEY};

#[derive(Debug, Clone, Default)]
pub struct MemoryRecords {
    tables: BTreeMap<String, Vec<Map<String, Value>>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// row 추가 (object가 아니면 무시)
    pub fn with_row(mut self, table: &str, row: Value) -> Self {
        if let Value::Object(row) = row {
            self.tables.entry(table.to_string()).or_default().push(row);
        }
        self
    }

    fn next_id(&self, table: &str) -> i64 {
        self.tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(PRIMARY_KEY).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }

    fn position(&self, table: &str, id: &Identifier) -> Option<usize> {
        self.tables.get(table)?.iter().position(|row| {
            row.get(PRIMARY_KEY)
                .and_then(Identifier::from_value)
                .as_ref()
                == Some(id)
        })
    }
}

impl RecordStore for MemoryRecords {
    fn get(&self, table: &str, id: &Identifier) -> Option<Map<String, Value>> {
        let index = self.position(table, id)?;
        self.tables.get(table).map(|rows| rows[index].clone())
    }

    fn list(&self, table: &str) -> Vec<Map<String, Value>> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    fn insert(&mut self, table: &str, record: Map<String, Value>) -> Identifier {
        let id = self.next_id(table);
        let mut row = Map::new();
        row.insert(PRIMARY_KEY.to_string(), Value::from(id));
        row.extend(record.into_iter().filter(|(key, _)| key != PRIMARY_KEY));
        self.tables.entry(table.to_string()).or_default().push(row);
        Identifier::from(id)
    }

    fn update(&mut self, table: &str, id: &Identifier, changes: Map<String, Value>) -> bool {
        let Some(index) = self.position(table, id) else {
            return false;
        };
        let Some(row) = self.tables.get_mut(table).and_then(|rows| rows.get_mut(index)) else {
            return false;
        };
        for (key, value) in changes {
            if key != PRIMARY_KEY {
                row.insert(key, value);
            }
        }
        true
    }

    fn remove(&mut self, table: &str, id: &Identifier) -> bool {
        let Some(index) = self.position(table, id) else {
            return false;
        };
        match self.tables.get_mut(table) {
            Some(rows) => {
                rows.remove(index);
                true
            }
            None => false,
        }
    }
}
