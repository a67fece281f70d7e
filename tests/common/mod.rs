#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use nutriscan::models::{Macros, MealRecord};
use nutriscan::store::{Direction, DocumentStore, OrderBy, SetOptions, StoredDocument};

/// Document store kept in memory, keyed by full document path.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Map<String, Value>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, doc_path: &str) -> Option<Map<String, Value>> {
        self.docs.lock().unwrap().get(doc_path).cloned()
    }

    pub fn insert_raw(&self, doc_path: &str, doc: Value) {
        let Value::Object(map) = doc else {
            panic!("document must be an object");
        };
        self.docs.lock().unwrap().insert(doc_path.to_string(), map);
    }
}

fn sort_key(doc: &Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    doc.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, collection_path: &str, doc: Map<String, Value>) -> Result<String> {
        let id = format!("doc{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.docs
            .lock()
            .unwrap()
            .insert(format!("{}/{}", collection_path, id), doc);
        Ok(id)
    }

    async fn query(&self, collection_path: &str, order: OrderBy) -> Result<Vec<StoredDocument>> {
        let prefix = format!("{}/", collection_path);
        let docs = self.docs.lock().unwrap();
        let mut matched: Vec<(String, Map<String, Value>)> = docs
            .iter()
            .filter_map(|(path, doc)| {
                let id = path.strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| (id.to_string(), doc.clone()))
            })
            .collect();

        matched.sort_by_key(|(_, doc)| sort_key(doc, &order.field));
        if order.direction == Direction::Descending {
            matched.reverse();
        }

        Ok(matched
            .into_iter()
            .map(|(id, doc)| StoredDocument {
                id,
                data: Value::Object(doc),
            })
            .collect())
    }

    async fn get(&self, doc_path: &str) -> Result<Option<Value>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .get(doc_path)
            .cloned()
            .map(Value::Object))
    }

    async fn set(&self, doc_path: &str, doc: Map<String, Value>, options: SetOptions) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        if options.merge {
            let existing = docs.entry(doc_path.to_string()).or_default();
            for (k, v) in doc {
                existing.insert(k, v);
            }
        } else {
            docs.insert(doc_path.to_string(), doc);
        }
        Ok(())
    }

    async fn delete(&self, doc_path: &str) -> Result<()> {
        self.docs.lock().unwrap().remove(doc_path);
        Ok(())
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn meal(id: &str, calories: f64, protein: f64, created_at: DateTime<Utc>) -> MealRecord {
    MealRecord {
        id: id.to_string(),
        food_name: format!("meal {}", id),
        image_url: None,
        calories,
        macros: Macros {
            protein,
            carbs: calories / 10.0,
            fat: calories / 40.0,
            fiber: 0.0,
            sugar: 0.0,
        },
        recommendations: vec![],
        created_at,
    }
}
