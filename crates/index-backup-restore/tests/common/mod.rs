//! In-memory search service shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use index_backup_restore::{Document, Error, Result, SearchService};

#[derive(Debug, Default)]
struct Index {
    schema: String,
    documents: Vec<Document>,
}

#[derive(Debug, Default)]
struct State {
    indexes: HashMap<String, Index>,
    failing_offsets: HashSet<u64>,
    deletes: Vec<String>,
    uploads: Vec<Vec<u8>>,
}

/// Search service keeping indexes in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryService {
    name: String,
    state: Arc<Mutex<State>>,
}

impl InMemoryService {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::default(),
        }
    }

    /// Adds an index with `count` hotel documents.
    pub fn with_index(self, index: &str, count: u64) -> Self {
        let documents = (0..count).map(hotel).collect();
        self.state.lock().unwrap().indexes.insert(
            index.to_string(),
            Index {
                schema: hotel_schema(index),
                documents,
            },
        );
        self
    }

    /// Makes page fetches starting at `offset` fail.
    pub fn fail_page_at(self, offset: u64) -> Self {
        self.state.lock().unwrap().failing_offsets.insert(offset);
        self
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.state.lock().unwrap().indexes.contains_key(index)
    }

    pub fn schema_of(&self, index: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        let raw = &state.indexes.get(index)?.schema;
        serde_json::from_str(raw).ok()
    }

    pub fn documents(&self, index: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(index)
            .map(|i| i.documents.clone())
            .unwrap_or_default()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }
}

#[async_trait]
impl SearchService for InMemoryService {
    fn service_name(&self) -> &str {
        &self.name
    }

    async fn fetch_schema(&self, index: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .indexes
            .get(index)
            .map(|i| i.schema.clone())
            .ok_or_else(|| Error::NotFound(format!("index '{index}'")))
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(index.to_string());
        state
            .indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("index '{index}'")))
    }

    async fn create_index(&self, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        let name = schema["name"]
            .as_str()
            .ok_or_else(|| Error::ValidationFailed("schema has no name".to_string()))?
            .to_string();
        let mut state = self.state.lock().unwrap();
        if state.indexes.contains_key(&name) {
            return Err(Error::Conflict(format!("index '{name}' already exists")));
        }
        state.indexes.insert(
            name,
            Index {
                schema: schema_json.to_string(),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<u64> {
        let state = self.state.lock().unwrap();
        state
            .indexes
            .get(index)
            .map(|i| i.documents.len() as u64)
            .ok_or_else(|| Error::NotFound(format!("index '{index}'")))
    }

    async fn fetch_page(&self, index: &str, offset: u64, size: usize) -> Result<Vec<Document>> {
        let state = self.state.lock().unwrap();
        if state.failing_offsets.contains(&offset) {
            return Err(Error::Transport(format!(
                "HTTP 503: page at offset {offset} unavailable"
            )));
        }
        let documents = &state
            .indexes
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("index '{index}'")))?
            .documents;
        Ok(documents
            .iter()
            .skip(offset as usize)
            .take(size)
            .cloned()
            .collect())
    }

    async fn upload_documents(&self, index: &str, body: Vec<u8>) -> Result<()> {
        let envelope: Value = serde_json::from_slice(&body)?;
        let batch: Vec<Document> = envelope["value"]
            .as_array()
            .ok_or_else(|| Error::ValidationFailed("body has no 'value' array".to_string()))?
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();

        let mut state = self.state.lock().unwrap();
        state.uploads.push(body);
        state
            .indexes
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("index '{index}'")))?
            .documents
            .extend(batch);
        Ok(())
    }
}

/// Hotel document number `i`, with a geography value as read from the service.
pub fn hotel(i: u64) -> Document {
    let value = json!({
        "HotelId": i.to_string(),
        "HotelName": format!("Hotel {i}"),
        "Rating": (i % 5) as f64,
        "Location": {
            "Latitude": 47.6 + i as f64 / 1000.0,
            "Longitude": -122.1,
            "IsEmpty": false,
            "Z": null,
            "M": null,
            "CoordinateSystem": {"EpsgId": 4326, "Id": "4326", "Name": "WGS84"}
        }
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Schema of a hotel index named `index`, as returned by the service.
pub fn hotel_schema(index: &str) -> String {
    json!({
        "@odata.context": "https://svc/$metadata#indexes/$entity",
        "@odata.etag": "\"0x1\"",
        "name": index,
        "fields": [
            {"name": "HotelId", "type": "Edm.String", "key": true},
            {"name": "HotelName", "type": "Edm.String", "searchable": true},
            {"name": "Rating", "type": "Edm.Double", "filterable": true},
            {"name": "Location", "type": "Edm.GeographyPoint"}
        ]
    })
    .to_string()
}
