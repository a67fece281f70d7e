use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::Session;
use crate::store::{Direction, DocumentStore, OrderBy, SetOptions, StoredDocument};

const BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore REST client acting as the signed-in user.
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    project_id: String,
    session: Session,
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub name: String,
    pub fields: Option<Map<String, Value>>,
    #[serde(rename = "createTime")]
    pub create_time: Option<String>,
    #[serde(rename = "updateTime")]
    pub update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryResponse {
    document: Option<Document>,
}

impl FirestoreClient {
    pub fn new(project_id: String, session: Session) -> Self {
        Self {
            client: Client::new(),
            project_id,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn documents_base(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            BASE_URL, self.project_id
        )
    }

    pub async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        let token = self.session.id_token().await?;
        let url = format!("{}/{}", self.documents_base(), path);
        tracing::debug!(path, "GET document");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("GET {} failed: {} - {}", path, status, body));
        }

        Ok(Some(resp.json().await?))
    }

    /// Create a document with an auto-generated id.
    pub async fn create_document(
        &self,
        collection_path: &str,
        fields: Map<String, Value>,
    ) -> Result<Document> {
        let token = self.session.id_token().await?;
        let url = format!("{}/{}", self.documents_base(), collection_path);
        tracing::debug!(collection_path, "POST document");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "CREATE {} failed: {} - {}",
                collection_path,
                status,
                body
            ));
        }

        Ok(resp.json().await?)
    }

    pub async fn run_query(
        &self,
        parent_path: Option<&str>,
        structured_query: Value,
    ) -> Result<Vec<Document>> {
        let token = self.session.id_token().await?;
        let parent = match parent_path {
            Some(p) => format!("{}/{}", self.documents_base(), p),
            None => self.documents_base(),
        };
        let url = format!("{}:runQuery", parent);

        let body = json!({
            "structuredQuery": structured_query
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("runQuery failed: {} - {}", status, body));
        }

        let results: Vec<RunQueryResponse> = resp.json().await?;
        Ok(results.into_iter().filter_map(|r| r.document).collect())
    }

    /// Write fields to a document, creating it if needed.
    ///
    /// With `field_paths` only those fields are replaced; without, the whole
    /// document is overwritten.
    pub async fn patch_document(
        &self,
        path: &str,
        fields: Map<String, Value>,
        field_paths: Option<&[String]>,
    ) -> Result<Document> {
        let token = self.session.id_token().await?;
        let url = format!("{}/{}", self.documents_base(), path);

        let mut req = self.client.patch(&url).bearer_auth(&token);

        if let Some(paths) = field_paths {
            for fp in paths {
                req = req.query(&[("updateMask.fieldPaths", fp.as_str())]);
            }
        }

        let resp: reqwest::Response = req.json(&json!({ "fields": fields })).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("PATCH {} failed: {} - {}", path, status, text));
        }

        Ok(resp.json().await?)
    }

    pub async fn delete_document(&self, path: &str) -> Result<()> {
        let token = self.session.id_token().await?;
        let url = format!("{}/{}", self.documents_base(), path);

        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("DELETE {} failed: {} - {}", path, status, text));
        }

        Ok(())
    }
}

/// Split `users/{uid}/meals` into parent document path and collection id.
fn split_collection_path(collection_path: &str) -> (Option<&str>, &str) {
    match collection_path.rsplit_once('/') {
        Some((parent, id)) => (Some(parent), id),
        None => (None, collection_path),
    }
}

/// Field paths that are not plain identifiers must be backtick-quoted.
fn quote_field_path(key: &str) -> String {
    let plain = key
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        key.to_string()
    } else {
        format!("`{}`", key.replace('`', "\\`"))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn save(&self, collection_path: &str, doc: Map<String, Value>) -> Result<String> {
        let fields = to_firestore_fields(&Value::Object(doc));
        let created = self.create_document(collection_path, fields).await?;
        document_id(&created.name)
            .map(String::from)
            .ok_or_else(|| anyhow!("created document has no id: {}", created.name))
    }

    async fn query(&self, collection_path: &str, order: OrderBy) -> Result<Vec<StoredDocument>> {
        let (parent, collection_id) = split_collection_path(collection_path);
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        let structured = json!({
            "from": [{ "collectionId": collection_id }],
            "orderBy": [{
                "field": { "fieldPath": order.field },
                "direction": direction
            }]
        });

        let docs = self.run_query(parent, structured).await?;
        Ok(docs.iter().filter_map(stored_document).collect())
    }

    async fn get(&self, doc_path: &str) -> Result<Option<Value>> {
        Ok(self
            .get_document(doc_path)
            .await?
            .map(|doc| document_data(&doc)))
    }

    async fn set(&self, doc_path: &str, doc: Map<String, Value>, options: SetOptions) -> Result<()> {
        let mask: Option<Vec<String>> = options
            .merge
            .then(|| doc.keys().map(|k| quote_field_path(k)).collect());
        let fields = to_firestore_fields(&Value::Object(doc));
        self.patch_document(doc_path, fields, mask.as_deref())
            .await?;
        Ok(())
    }

    async fn delete(&self, doc_path: &str) -> Result<()> {
        self.delete_document(doc_path).await
    }
}

/// Convert a serde_json::Value into Firestore's typed value format.
///
/// RFC 3339 strings are stored as timestamps so they sort chronologically.
pub fn to_firestore_value(val: &Value) -> Value {
    match val {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({"integerValue": i.to_string()})
            } else if let Some(f) = n.as_f64() {
                json!({"doubleValue": f})
            } else {
                json!({"integerValue": n.to_string()})
            }
        }
        Value::String(s) if is_timestamp(s) => json!({"timestampValue": s}),
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(arr) => {
            let values: Vec<Value> = arr.iter().map(to_firestore_value).collect();
            json!({"arrayValue": {"values": values}})
        }
        Value::Object(map) => {
            let mut fields = Map::new();
            for (k, v) in map {
                fields.insert(k.clone(), to_firestore_value(v));
            }
            json!({"mapValue": {"fields": fields}})
        }
    }
}

fn is_timestamp(s: &str) -> bool {
    s.len() >= 20 && s.contains('T') && DateTime::parse_from_rfc3339(s).is_ok()
}

/// Convert a flat JSON object into Firestore fields format.
pub fn to_firestore_fields(obj: &Value) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(map) = obj.as_object() {
        for (k, v) in map {
            fields.insert(k.clone(), to_firestore_value(v));
        }
    }
    fields
}

/// Parse a Firestore typed value into a serde_json::Value.
pub fn parse_firestore_value(val: &Value) -> Value {
    if let Some(s) = val.get("stringValue") {
        return s.clone();
    }
    if let Some(i) = val.get("integerValue") {
        // Firestore sends integers as strings
        if let Some(s) = i.as_str() {
            if let Ok(n) = s.parse::<i64>() {
                return json!(n);
            }
        }
        return i.clone();
    }
    if let Some(d) = val.get("doubleValue") {
        return d.clone();
    }
    if let Some(b) = val.get("booleanValue") {
        return b.clone();
    }
    if val.get("nullValue").is_some() {
        return Value::Null;
    }
    if let Some(ts) = val.get("timestampValue") {
        return ts.clone();
    }
    if let Some(r) = val.get("referenceValue") {
        return r.clone();
    }
    if let Some(map) = val.get("mapValue") {
        if let Some(fields) = map.get("fields") {
            return parse_firestore_fields(fields);
        }
        return json!({});
    }
    if let Some(arr) = val.get("arrayValue") {
        if let Some(values) = arr.get("values").and_then(|v| v.as_array()) {
            return Value::Array(values.iter().map(parse_firestore_value).collect());
        }
        return json!([]);
    }

    // Unknown format, return as-is
    val.clone()
}

/// Parse Firestore document fields into a flat JSON object.
pub fn parse_firestore_fields(fields: &Value) -> Value {
    if let Some(map) = fields.as_object() {
        let mut result = Map::new();
        for (key, val) in map {
            result.insert(key.clone(), parse_firestore_value(val));
        }
        Value::Object(result)
    } else {
        Value::Null
    }
}

/// Last segment of a document resource name.
pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Parsed fields of a document; an empty object when it has none.
pub fn document_data(doc: &Document) -> Value {
    match doc.fields {
        Some(ref fields) => parse_firestore_fields(&Value::Object(fields.clone())),
        None => json!({}),
    }
}

fn stored_document(doc: &Document) -> Option<StoredDocument> {
    Some(StoredDocument {
        id: document_id(&doc.name)?.to_string(),
        data: document_data(doc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars_and_timestamps() {
        let fields = to_firestore_fields(&json!({
            "foodName": "Paella",
            "calories": 650,
            "protein": 31.5,
            "createdAt": "2025-03-01T12:30:00.000Z",
            "imageUrl": null
        }));
        assert_eq!(fields["foodName"], json!({"stringValue": "Paella"}));
        assert_eq!(fields["calories"], json!({"integerValue": "650"}));
        assert_eq!(fields["protein"], json!({"doubleValue": 31.5}));
        assert_eq!(
            fields["createdAt"],
            json!({"timestampValue": "2025-03-01T12:30:00.000Z"})
        );
        assert_eq!(fields["imageUrl"], json!({"nullValue": null}));
    }

    #[test]
    fn decodes_nested_document() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/u1/meals/abc",
            "fields": {
                "calories": {"integerValue": "420"},
                "macros": {"mapValue": {"fields": {"protein": {"doubleValue": 20.5}}}},
                "recommendations": {"arrayValue": {"values": [{"stringValue": "more greens"}]}},
                "createdAt": {"timestampValue": "2025-03-01T12:30:00Z"}
            }
        }))
        .unwrap();

        let stored = stored_document(&doc).unwrap();
        assert_eq!(stored.id, "abc");
        assert_eq!(stored.data["calories"], json!(420));
        assert_eq!(stored.data["macros"]["protein"], json!(20.5));
        assert_eq!(stored.data["recommendations"][0], json!("more greens"));
        assert_eq!(stored.data["createdAt"], json!("2025-03-01T12:30:00Z"));
    }

    #[test]
    fn splits_collection_paths() {
        assert_eq!(
            split_collection_path("users/u1/meals"),
            (Some("users/u1"), "meals")
        );
        assert_eq!(split_collection_path("users"), (None, "users"));
    }

    #[test]
    fn quotes_non_identifier_field_paths() {
        assert_eq!(quote_field_path("fitnessGoal"), "fitnessGoal");
        assert_eq!(quote_field_path("0312"), "`0312`");
        assert_eq!(quote_field_path("a-b"), "`a-b`");
    }
}
