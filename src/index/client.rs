//! Administrative client for the search index.
//!
//! [`SearchIndexApi`] is the seam the reconciler works against: collection
//! and config-set admin for tenant provisioning, schema admin for field
//! reconciliation. [`HttpIndexClient`] implements it over the
//! Solr-compatible HTTP admin API; [`super::fake::InMemoryIndex`] implements
//! it in memory for tests.

use std::future::Future;
use std::time::Duration;

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::{IndexError, IndexResult};
use crate::index::fields::IndexField;

/// Administrative interface to the search index.
///
/// Every method returns [`IndexError`] so callers can tell their own bad
/// input ([`IndexError::BadRequest`]) from remote failures.
pub trait SearchIndexApi: Send + Sync {
    /// Names of all collections.
    fn list_collections(&self) -> impl Future<Output = IndexResult<Vec<String>>> + Send;

    /// Create a collection backed by the given config set.
    fn create_collection(
        &self,
        name: &str,
        config_set: &str,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Delete a collection.
    fn delete_collection(&self, name: &str) -> impl Future<Output = IndexResult<()>> + Send;

    /// Names of all config sets.
    fn list_config_sets(&self) -> impl Future<Output = IndexResult<Vec<String>>> + Send;

    /// Create a config set, optionally copied from a base set.
    fn create_config_set(
        &self,
        name: &str,
        base: Option<&str>,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Upload a config set as a zip archive.
    fn upload_config_set(
        &self,
        name: &str,
        archive: &[u8],
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Delete a config set.
    fn delete_config_set(&self, name: &str) -> impl Future<Output = IndexResult<()>> + Send;

    /// Concrete fields of a collection's schema.
    fn list_fields(
        &self,
        collection: &str,
    ) -> impl Future<Output = IndexResult<Vec<IndexField>>> + Send;

    /// Dynamic fields of a collection's schema, most specific first as the
    /// index evaluates them.
    fn list_dynamic_fields(
        &self,
        collection: &str,
    ) -> impl Future<Output = IndexResult<Vec<IndexField>>> + Send;

    /// Add a concrete field to a collection's schema.
    fn add_field(
        &self,
        collection: &str,
        field: &IndexField,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Replace a concrete field definition.
    fn replace_field(
        &self,
        collection: &str,
        field: &IndexField,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Add a dynamic field to a collection's schema.
    fn add_dynamic_field(
        &self,
        collection: &str,
        field: &IndexField,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Replace a dynamic field definition.
    fn replace_dynamic_field(
        &self,
        collection: &str,
        field: &IndexField,
    ) -> impl Future<Output = IndexResult<()>> + Send;
}

/// Configuration for an [`HttpIndexClient`].
#[derive(Debug, Clone)]
pub struct HttpIndexConfig {
    url: Url,
    timeout: Duration,
}

impl HttpIndexConfig {
    /// Targets the index admin API at the specified base URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the default 60 second request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the [`HttpIndexClient`].
    pub fn build(self) -> IndexResult<HttpIndexClient> {
        let inner = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.timeout)
            .build()?;
        Ok(HttpIndexClient {
            inner,
            url: self.url,
        })
    }
}

/// HTTP client for the Solr-compatible index admin API.
///
/// Collection and config-set admin go through `/admin/collections` and
/// `/admin/configs` action queries; schema reads hit
/// `/{collection}/schema/fields` and `/schema/dynamicfields`; schema writes
/// post single-command JSON documents to `/{collection}/schema`.
#[derive(Debug, Clone)]
pub struct HttpIndexClient {
    inner: reqwest::Client,
    url: Url,
}

impl HttpIndexClient {
    fn endpoint(&self, segments: &[&str]) -> IndexResult<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::from_status(400, "Index base URL cannot carry path segments"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and apply the engine's two-level failure contract: the
    /// HTTP status must be 2xx and the body's `responseHeader.status` must be
    /// zero.
    async fn send(&self, request: reqwest::RequestBuilder) -> IndexResult<serde_json::Value> {
        let response = request.send().await?;
        let status = response.status();
        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                if status.is_success() {
                    return Err(error.into());
                }
                return Err(IndexError::from_status(status.as_u16(), status.to_string()));
            }
        };

        if !status.is_success() {
            let message = body
                .pointer("/error/msg")
                .and_then(|m| m.as_str())
                .unwrap_or("request failed")
                .to_string();
            return Err(IndexError::from_status(status.as_u16(), message));
        }
        if let Some(code) = body
            .pointer("/responseHeader/status")
            .and_then(|s| s.as_i64())
        {
            if code != 0 {
                let message = body
                    .pointer("/error/msg")
                    .and_then(|m| m.as_str())
                    .unwrap_or("engine reported failure")
                    .to_string();
                return Err(IndexError::Engine { code, message });
            }
        }
        Ok(body)
    }

    async fn schema_command(
        &self,
        collection: &str,
        command: &str,
        field: &IndexField,
    ) -> IndexResult<()> {
        let url = self.endpoint(&[collection, "schema"])?;
        debug!("Schema {} on '{}': {}", command, collection, field.name);
        let mut body = serde_json::Map::new();
        body.insert(command.to_string(), serde_json::to_value(field)?);
        self.send(self.inner.post(url).json(&serde_json::Value::Object(body)))
            .await?;
        Ok(())
    }
}

impl SearchIndexApi for HttpIndexClient {
    async fn list_collections(&self) -> IndexResult<Vec<String>> {
        let url = self.endpoint(&["admin", "collections"])?;
        let body = self
            .send(self.inner.get(url).query(&[("action", "LIST"), ("wt", "json")]))
            .await?;
        let parsed: CollectionsResponse = serde_json::from_value(body)?;
        Ok(parsed.collections)
    }

    async fn create_collection(&self, name: &str, config_set: &str) -> IndexResult<()> {
        let url = self.endpoint(&["admin", "collections"])?;
        self.send(self.inner.post(url).query(&[
            ("action", "CREATE"),
            ("name", name),
            ("collection.configName", config_set),
            ("numShards", "1"),
            ("wt", "json"),
        ]))
        .await?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> IndexResult<()> {
        let url = self.endpoint(&["admin", "collections"])?;
        self.send(
            self.inner
                .post(url)
                .query(&[("action", "DELETE"), ("name", name), ("wt", "json")]),
        )
        .await?;
        Ok(())
    }

    async fn list_config_sets(&self) -> IndexResult<Vec<String>> {
        let url = self.endpoint(&["admin", "configs"])?;
        let body = self
            .send(self.inner.get(url).query(&[("action", "LIST"), ("wt", "json")]))
            .await?;
        let parsed: ConfigSetsResponse = serde_json::from_value(body)?;
        Ok(parsed.config_sets)
    }

    async fn create_config_set(&self, name: &str, base: Option<&str>) -> IndexResult<()> {
        let url = self.endpoint(&["admin", "configs"])?;
        let mut request = self
            .inner
            .post(url)
            .query(&[("action", "CREATE"), ("name", name), ("wt", "json")]);
        if let Some(base) = base {
            request = request.query(&[("baseConfigSet", base)]);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn upload_config_set(&self, name: &str, archive: &[u8]) -> IndexResult<()> {
        let url = self.endpoint(&["admin", "configs"])?;
        self.send(
            self.inner
                .post(url)
                .query(&[("action", "UPLOAD"), ("name", name), ("wt", "json")])
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(archive.to_vec()),
        )
        .await?;
        Ok(())
    }

    async fn delete_config_set(&self, name: &str) -> IndexResult<()> {
        let url = self.endpoint(&["admin", "configs"])?;
        self.send(
            self.inner
                .post(url)
                .query(&[("action", "DELETE"), ("name", name), ("wt", "json")]),
        )
        .await?;
        Ok(())
    }

    async fn list_fields(&self, collection: &str) -> IndexResult<Vec<IndexField>> {
        let url = self.endpoint(&[collection, "schema", "fields"])?;
        let body = self.send(self.inner.get(url)).await?;
        let parsed: FieldsResponse = serde_json::from_value(body)?;
        Ok(parsed.fields)
    }

    async fn list_dynamic_fields(&self, collection: &str) -> IndexResult<Vec<IndexField>> {
        let url = self.endpoint(&[collection, "schema", "dynamicfields"])?;
        let body = self.send(self.inner.get(url)).await?;
        let parsed: DynamicFieldsResponse = serde_json::from_value(body)?;
        Ok(parsed.dynamic_fields)
    }

    async fn add_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        self.schema_command(collection, "add-field", field).await
    }

    async fn replace_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        self.schema_command(collection, "replace-field", field).await
    }

    async fn add_dynamic_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        self.schema_command(collection, "add-dynamic-field", field)
            .await
    }

    async fn replace_dynamic_field(&self, collection: &str, field: &IndexField) -> IndexResult<()> {
        self.schema_command(collection, "replace-dynamic-field", field)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    #[serde(default)]
    collections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigSetsResponse {
    #[serde(rename = "configSets", default)]
    config_sets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    fields: Vec<IndexField>,
}

#[derive(Debug, Deserialize)]
struct DynamicFieldsResponse {
    #[serde(rename = "dynamicFields", default)]
    dynamic_fields: Vec<IndexField>,
}
