use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use shared_config::ClinicConfig;

/// Thin client for the MongoDB Atlas Data API. Every store talks to the
/// document database through this one request path.
pub struct AtlasClient {
    client: Client,
    base_url: String,
    api_key: String,
    data_source: String,
    database: String,
}

#[derive(serde::Deserialize)]
struct FindResult<T> {
    documents: Vec<T>,
}

#[derive(serde::Deserialize)]
struct FindOneResult<T> {
    document: Option<T>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResult {
    deleted_count: u64,
}

impl AtlasClient {
    pub fn new(config: &ClinicConfig) -> Self {
        Self::with_settings(
            config.data_api_url.clone(),
            config.data_api_key.clone(),
            config.data_source.clone(),
            config.database_name.clone(),
        )
    }

    pub fn with_settings(
        base_url: String,
        api_key: String,
        data_source: String,
        database: String,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            data_source,
            database,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("api-key", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    /// Run a Data API action (`find`, `findOne`, `insertOne`, `updateOne`,
    /// `deleteMany`, ...) against a collection. `payload` carries the
    /// action-specific fields (filter, document, update, sort, limit).
    pub async fn action<T>(&self, action: &str, collection: &str, payload: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/action/{}", self.base_url, action);
        debug!("Data API {} on {}", action, collection);

        let mut body = Map::new();
        body.insert("dataSource".to_string(), json!(self.data_source));
        body.insert("database".to_string(), json!(self.database));
        body.insert("collection".to_string(), json!(collection));
        if let Value::Object(extra) = payload {
            for (key, value) in extra {
                body.insert(key, value);
            }
        }

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&Value::Object(body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Data API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("Data API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn find<T>(
        &self,
        collection: &str,
        filter: Value,
        sort: Option<Value>,
        limit: Option<i64>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut payload = Map::new();
        payload.insert("filter".to_string(), filter);
        if let Some(sort) = sort {
            payload.insert("sort".to_string(), sort);
        }
        if let Some(limit) = limit {
            payload.insert("limit".to_string(), json!(limit));
        }

        let result: FindResult<T> = self
            .action("find", collection, Value::Object(payload))
            .await?;
        Ok(result.documents)
    }

    pub async fn find_one<T>(&self, collection: &str, filter: Value) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let result: FindOneResult<T> = self
            .action("findOne", collection, json!({ "filter": filter }))
            .await?;
        Ok(result.document)
    }

    pub async fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        let _: Value = self
            .action("insertOne", collection, json!({ "document": document }))
            .await?;
        Ok(())
    }

    pub async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
    ) -> Result<UpdateOutcome> {
        self.action(
            "updateOne",
            collection,
            json!({ "filter": filter, "update": update }),
        )
        .await
    }

    pub async fn upsert_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
    ) -> Result<UpdateOutcome> {
        self.action(
            "updateOne",
            collection,
            json!({ "filter": filter, "update": update, "upsert": true }),
        )
        .await
    }

    pub async fn delete_many(&self, collection: &str, filter: Value) -> Result<u64> {
        let result: DeleteResult = self
            .action("deleteMany", collection, json!({ "filter": filter }))
            .await?;
        Ok(result.deleted_count)
    }
}

/// The Data API reports unique-index violations as a MongoDB E11000 error in
/// the response body; stores translate those into domain conflicts.
pub fn is_duplicate_key(err: &anyhow::Error) -> bool {
    let text = err.to_string();
    text.contains("E11000") || text.contains("duplicate key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> AtlasClient {
        AtlasClient::with_settings(
            base_url,
            "test-api-key".to_string(),
            "Cluster0".to_string(),
            "clinic".to_string(),
        )
    }

    #[tokio::test]
    async fn find_unwraps_documents() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/action/find"))
            .and(body_partial_json(serde_json::json!({
                "database": "clinic",
                "collection": "users",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [{ "name": "Asha" }, { "name": "Ravi" }]
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let docs: Vec<Value> = client
            .find("users", serde_json::json!({}), None, None)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["name"], "Asha");
    }

    #[tokio::test]
    async fn find_one_handles_missing_document() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/action/findOne"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "document": null
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let doc: Option<Value> = client
            .find_one("users", serde_json::json!({ "phone": "+911234567890" }))
            .await
            .unwrap();

        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn duplicate_key_errors_are_recognizable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/action/insertOne"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "E11000 duplicate key error collection: clinic.appointments",
            ))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client
            .insert_one("appointments", serde_json::json!({ "date": "2026-08-10" }))
            .await
            .unwrap_err();

        assert!(is_duplicate_key(&err));
    }
}
