//! Metadata service client (GraphQL over HTTP).
//!
//! All calls are blocking request/response. A non-success status or a
//! transport failure is reported as a fatal error.

use crate::models::config::{ServerConfig, SortDirection};
use crate::models::record::{MetadataRecord, Studio};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

/// First schema version with the normalized folders/files tables.
pub const DB_VERSION_FILE_REFACTOR: u32 = 32;
/// First schema version exposing the studio code.
pub const DB_VERSION_STUDIO_CODE: u32 = 38;

/// How a path filter compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathModifier {
    Equals,
    Includes,
}

impl PathModifier {
    fn as_str(&self) -> &'static str {
        match self {
            PathModifier::Equals => "EQUALS",
            PathModifier::Includes => "INCLUDES",
        }
    }
}

/// Minimal item returned by a path query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathMatch {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Result of a path query.
#[derive(Debug, Clone, Default)]
pub struct PathMatches {
    pub count: usize,
    pub items: Vec<PathMatch>,
}

/// Operations the renamer needs from the metadata service.
pub trait MetadataService {
    /// Fetch one item.
    fn find_item(&self, id: &str) -> Result<Option<MetadataRecord>>;

    /// Fetch a page of items ordered by update time.
    fn find_items(&self, per_page: u32, direction: SortDirection) -> Result<Vec<MetadataRecord>>;

    /// Items whose path matches.
    fn find_by_path(&self, path: &str, modifier: PathModifier) -> Result<PathMatches>;

    /// Fetch one studio with its embedded parent.
    fn find_studio(&self, id: &str) -> Result<Option<Studio>>;

    /// Remove tags from items.
    fn remove_tags(&self, item_ids: &[String], tag_ids: &[String]) -> Result<()>;
}

/// GraphQL request payload.
#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct FindItemsResult {
    #[serde(default)]
    galleries: Vec<MetadataRecord>,
}

#[derive(Debug, Deserialize)]
struct FindPathResult {
    count: usize,
    #[serde(default)]
    galleries: Vec<PathMatch>,
}

/// GraphQL client for the metadata service.
pub struct GraphQlClient {
    endpoint: String,
    client: reqwest::blocking::Client,
    file_query: String,
}

impl GraphQlClient {
    /// Create a client. The file fragment is chosen once the schema
    /// version is known, see [`GraphQlClient::with_schema`].
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref key) = config.api_key {
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| crate::Error::Config(format!("invalid api_key: {}", e)))?;
            headers.insert("ApiKey", value);
        }
        if let Some(ref cookie) = config.session_cookie {
            let value = reqwest::header::HeaderValue::from_str(&format!("session={}", cookie))
                .map_err(|e| crate::Error::Config(format!("invalid session_cookie: {}", e)))?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            endpoint: format!("{}/graphql", config.url.trim_end_matches('/')),
            client,
            file_query: file_fragment(DB_VERSION_FILE_REFACTOR),
        })
    }

    /// Select the file fragment matching the schema version.
    pub fn with_schema(mut self, version: u32) -> Self {
        self.file_query = file_fragment(version);
        self
    }

    /// Run a query and return its `data` object.
    fn call(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let request = GraphQlRequest { query, variables };
        let response = self.client.post(&self.endpoint).json(&request).send()?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(crate::Error::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(crate::Error::GraphQl(format!(
                "query failed: {} - {}",
                status, body
            )));
        }

        let body: GraphQlResponse = response.json()?;
        if let Some(errors) = body.errors {
            if !errors.is_empty() {
                let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
                return Err(crate::Error::GraphQl(messages.join("; ")));
            }
        }
        body.data
            .ok_or_else(|| crate::Error::GraphQl("response without data".to_string()))
    }

    /// Schema version of the service database.
    pub fn database_schema(&self) -> Result<u32> {
        let data = self.call("{ systemStatus { databaseSchema } }", None)?;
        data["systemStatus"]["databaseSchema"]
            .as_u64()
            .map(|v| v as u32)
            .ok_or_else(|| crate::Error::GraphQl("missing databaseSchema".to_string()))
    }

    /// Path of the index database as configured on the service.
    pub fn database_path(&self) -> Result<PathBuf> {
        let data = self.call(
            "query Configuration { configuration { general { databasePath } } }",
            None,
        )?;
        data["configuration"]["general"]["databasePath"]
            .as_str()
            .map(PathBuf::from)
            .ok_or_else(|| crate::Error::GraphQl("missing databasePath".to_string()))
    }

    fn item_fragment(&self) -> String {
        format!(
            r#"
            fragment ItemData on Gallery {{
                id
                title
                date
                rating100
                organized
                {files}
                studio {{ id name parent_studio {{ id name }} }}
                tags {{ id name }}
                performers {{
                    id
                    name
                    gender
                    favorite
                    rating100
                    stash_ids {{ endpoint stash_id }}
                }}
            }}"#,
            files = self.file_query
        )
    }
}

/// File fields differ between schema generations.
fn file_fragment(version: u32) -> String {
    let mut fragment = if version >= DB_VERSION_FILE_REFACTOR {
        "files { path video_codec audio_codec width height frame_rate duration bit_rate \
         fingerprints { type value } }"
            .to_string()
    } else {
        "path file { video_codec audio_codec width height framerate bitrate duration }".to_string()
    };
    if version >= DB_VERSION_STUDIO_CODE {
        fragment = format!("code {}", fragment);
    }
    fragment
}

impl MetadataService for GraphQlClient {
    fn find_item(&self, id: &str) -> Result<Option<MetadataRecord>> {
        let query = format!(
            "query FindGallery($id: ID!) {{ findGallery(id: $id) {{ ...ItemData }} }} {}",
            self.item_fragment()
        );
        let data = self.call(&query, Some(json!({ "id": id })))?;
        let item = data["findGallery"].clone();
        if item.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(item)?))
    }

    fn find_items(&self, per_page: u32, direction: SortDirection) -> Result<Vec<MetadataRecord>> {
        let query = format!(
            "query FindGalleries($filter: FindFilterType) {{ findGalleries(filter: $filter) {{ count galleries {{ ...ItemData }} }} }} {}",
            self.item_fragment()
        );
        let variables = json!({
            "filter": {
                "direction": direction.as_str(),
                "page": 1,
                "per_page": per_page,
                "sort": "updated_at"
            }
        });
        let data = self.call(&query, Some(variables))?;
        let result: FindItemsResult = serde_json::from_value(data["findGalleries"].clone())?;
        Ok(result.galleries)
    }

    fn find_by_path(&self, path: &str, modifier: PathModifier) -> Result<PathMatches> {
        let query = r#"
            query FindGalleries($filter: FindFilterType, $gallery_filter: GalleryFilterType) {
                findGalleries(filter: $filter, gallery_filter: $gallery_filter) {
                    count
                    galleries { id title }
                }
            }"#;
        let variables = json!({
            "filter": { "direction": "ASC", "page": 1, "per_page": 40, "sort": "updated_at" },
            "gallery_filter": { "path": { "modifier": modifier.as_str(), "value": path } }
        });
        let data = self.call(query, Some(variables))?;
        let result: FindPathResult = serde_json::from_value(data["findGalleries"].clone())?;
        Ok(PathMatches {
            count: result.count,
            items: result.galleries,
        })
    }

    fn find_studio(&self, id: &str) -> Result<Option<Studio>> {
        let query = r#"
            query FindStudio($id: ID!) {
                findStudio(id: $id) { id name parent_studio { id name } }
            }"#;
        let data = self.call(query, Some(json!({ "id": id })))?;
        let studio = data["findStudio"].clone();
        if studio.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(studio)?))
    }

    fn remove_tags(&self, item_ids: &[String], tag_ids: &[String]) -> Result<()> {
        let query = r#"
            mutation BulkGalleryUpdate($input: BulkGalleryUpdateInput!) {
                bulkGalleryUpdate(input: $input) { id }
            }"#;
        let variables = json!({
            "input": { "ids": item_ids, "tag_ids": { "ids": tag_ids, "mode": "REMOVE" } }
        });
        self.call(query, Some(variables))?;
        tracing::info!("Removed tag(s) {:?} from {:?}", tag_ids, item_ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_fragment_by_version() {
        assert!(file_fragment(31).starts_with("path file"));
        assert!(file_fragment(32).starts_with("files"));
        assert!(file_fragment(38).starts_with("code files"));
    }

    #[test]
    fn test_file_fragment_requests_attributes() {
        for version in [31, 32] {
            let fragment = file_fragment(version);
            for field in ["video_codec", "audio_codec", "width", "height", "duration"] {
                assert!(fragment.contains(field), "{} missing for version {}", field, version);
            }
        }
        assert!(file_fragment(32).contains("frame_rate"));
        assert!(file_fragment(31).contains("framerate"));
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let config = ServerConfig {
            url: "http://localhost:9999/".to_string(),
            ..Default::default()
        };
        let client = GraphQlClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9999/graphql");
    }
}
