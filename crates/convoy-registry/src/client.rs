//! npm registry client

use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use convoy_core::error::{RegistryError, Result};
use convoy_core::traits::{RegistryClient, Tarball};

use crate::auth::{escape_name, load_token};

/// npm registry configuration
#[derive(Debug, Clone)]
pub struct NpmConfig {
    /// Registry URL (default: https://registry.npmjs.org)
    pub registry_url: String,
    /// Authentication token; loaded on first use when unset
    pub token: Option<String>,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://registry.npmjs.org".to_string(),
            token: None,
        }
    }
}

impl NpmConfig {
    /// Set registry URL
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Registry client speaking the npm HTTP API
pub struct NpmRegistry {
    config: NpmConfig,
    client: Client,
    token: OnceCell<Option<String>>,
}

impl NpmRegistry {
    /// Create a new registry client
    pub fn new(config: NpmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            token: OnceCell::new(),
        }
    }

    /// Registry base URL
    pub fn registry_url(&self) -> &str {
        &self.config.registry_url
    }

    async fn token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_init(|| async {
                self.config
                    .token
                    .clone()
                    .or_else(|| load_token(&self.config.registry_url))
            })
            .await;
        token.as_deref().ok_or_else(|| {
            RegistryError::AuthenticationFailed {
                registry: self.config.registry_url.clone(),
                reason: "no token in NPM_TOKEN or ~/.npmrc".to_string(),
            }
            .into()
        })
    }

    fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.config.registry_url, escape_name(name))
    }

    fn dist_tag_url(&self, name: &str, tag: &str) -> String {
        format!(
            "{}/-/package/{}/dist-tags/{}",
            self.config.registry_url,
            escape_name(name),
            tag
        )
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    #[instrument(skip(self, manifest, tarball), fields(package = %tarball.name, version = %tarball.version))]
    async fn publish(&self, manifest: &Map<String, Value>, tarball: &Tarball, dist_tag: &str) -> Result<()> {
        let start = Instant::now();
        let token = self.token().await?;
        let payload = publish_payload(manifest, tarball, dist_tag, &self.config.registry_url);
        let url = self.package_url(&tarball.name);
        debug!(url = %url, size = tarball.data.len(), "publishing package");

        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RegistryError::PublishFailed {
                package: tarball.name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            info!(
                package = %tarball.name,
                version = %tarball.version,
                tag = dist_tag,
                duration_ms = start.elapsed().as_millis() as u64,
                "published to registry"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(publish_error(status, &body, tarball, &self.config.registry_url).into())
    }

    #[instrument(skip(self))]
    async fn fetch_versions(&self, name: &str) -> Result<Vec<String>> {
        let start = Instant::now();
        let lookup_failed = |reason: String| RegistryError::LookupFailed {
            package: name.to_string(),
            reason,
        };

        let mut request = self
            .client
            .get(self.package_url(name))
            .header("Accept", "application/vnd.npm.install-v1+json");
        // Private packages need a token to be visible; public lookups work without one.
        if let Ok(token) = self.token().await {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(name.to_string()).into());
        }
        let response = ensure_success(response)
            .await
            .map_err(lookup_failed)?;

        #[derive(Deserialize)]
        struct Packument {
            #[serde(default)]
            versions: Map<String, Value>,
        }

        let packument: Packument = response
            .json()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;
        let versions: Vec<String> = packument.versions.keys().cloned().collect();
        debug!(
            package = name,
            count = versions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "fetched registry versions"
        );
        Ok(versions)
    }

    #[instrument(skip(self))]
    async fn add_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()> {
        let token = self.token().await?;
        let tag_failed = |reason: String| RegistryError::DistTagFailed {
            package: name.to_string(),
            tag: tag.to_string(),
            reason,
        };

        let response = self
            .client
            .put(self.dist_tag_url(name, tag))
            .bearer_auth(token)
            .json(&json!(version))
            .send()
            .await
            .map_err(|e| tag_failed(e.to_string()))?;
        ensure_success(response).await.map_err(tag_failed)?;

        info!(package = name, version, tag, "added dist-tag");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_dist_tag(&self, name: &str, tag: &str) -> Result<()> {
        let token = self.token().await?;
        let tag_failed = |reason: String| RegistryError::DistTagFailed {
            package: name.to_string(),
            tag: tag.to_string(),
            reason,
        };

        let response = self
            .client
            .delete(self.dist_tag_url(name, tag))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| tag_failed(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(format!("{name}@{tag}")).into());
        }
        ensure_success(response).await.map_err(tag_failed)?;

        info!(package = name, tag, "removed dist-tag");
        Ok(())
    }
}

async fn ensure_success(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("{status}: {body}"))
}

/// Document the registry expects for `PUT /<name>`
pub(crate) fn publish_payload(
    manifest: &Map<String, Value>,
    tarball: &Tarball,
    dist_tag: &str,
    registry_url: &str,
) -> Value {
    let mut version_doc = manifest.clone();
    version_doc.insert(
        "_id".to_string(),
        json!(format!("{}@{}", tarball.name, tarball.version)),
    );
    version_doc.insert(
        "dist".to_string(),
        json!({
            "integrity": tarball.integrity,
            "shasum": tarball.shasum,
            "tarball": format!(
                "{}/{}/-/{}",
                registry_url,
                tarball.name,
                tarball.filename
            ),
        }),
    );

    json!({
        "_id": tarball.name,
        "name": tarball.name,
        "description": manifest.get("description").cloned().unwrap_or(Value::Null),
        "dist-tags": { dist_tag: tarball.version },
        "versions": { tarball.version.clone(): Value::Object(version_doc) },
        "_attachments": {
            tarball.filename.clone(): {
                "content_type": "application/octet-stream",
                "data": BASE64.encode(&tarball.data),
                "length": tarball.data.len(),
            }
        },
    })
}

/// Map a failed publish response to a registry error
///
/// The registry rejects republishing an existing version with 409, or with
/// 403 and a "cannot publish over" message.
pub(crate) fn publish_error(status: StatusCode, body: &str, tarball: &Tarball, registry: &str) -> RegistryError {
    let conflict = status == StatusCode::CONFLICT
        || (status == StatusCode::FORBIDDEN
            && (body.contains("cannot publish over") || body.contains("previously published")));
    if conflict {
        return RegistryError::AlreadyPublished {
            package: tarball.name.clone(),
            version: tarball.version.clone(),
        };
    }
    if status == StatusCode::UNAUTHORIZED {
        return RegistryError::AuthenticationFailed {
            registry: registry.to_string(),
            reason: body.to_string(),
        };
    }
    RegistryError::PublishFailed {
        package: tarball.name.clone(),
        reason: format!("{status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tarball() -> Tarball {
        Tarball {
            name: "@scope/pkg".to_string(),
            version: "1.2.3".to_string(),
            filename: "scope-pkg-1.2.3.tgz".to_string(),
            data: b"tarball".to_vec(),
            integrity: "sha512-abc".to_string(),
            shasum: "0123abcd".to_string(),
        }
    }

    #[test]
    fn test_config_builder() {
        let config = NpmConfig::default()
            .with_registry_url("https://npm.example.com/")
            .with_token("test-token");
        assert_eq!(config.registry_url, "https://npm.example.com");
        assert_eq!(config.token.as_deref(), Some("test-token"));
    }

    #[test]
    fn test_urls_escape_scoped_names() {
        let registry = NpmRegistry::new(NpmConfig::default());
        assert_eq!(
            registry.package_url("@scope/pkg"),
            "https://registry.npmjs.org/@scope%2fpkg"
        );
        assert_eq!(
            registry.dist_tag_url("@scope/pkg", "next"),
            "https://registry.npmjs.org/-/package/@scope%2fpkg/dist-tags/next"
        );
    }

    #[test]
    fn test_publish_payload() {
        let mut manifest = Map::new();
        manifest.insert("name".to_string(), json!("@scope/pkg"));
        manifest.insert("version".to_string(), json!("1.2.3"));
        manifest.insert("gitHead".to_string(), json!("deadbeef"));

        let payload = publish_payload(&manifest, &tarball(), "convoy-temp", "https://registry.npmjs.org");

        assert_eq!(payload["dist-tags"]["convoy-temp"], "1.2.3");
        let version = &payload["versions"]["1.2.3"];
        assert_eq!(version["gitHead"], "deadbeef");
        assert_eq!(version["_id"], "@scope/pkg@1.2.3");
        assert_eq!(version["dist"]["integrity"], "sha512-abc");
        let attachment = &payload["_attachments"]["scope-pkg-1.2.3.tgz"];
        assert_eq!(attachment["data"], BASE64.encode(b"tarball"));
        assert_eq!(attachment["length"], 7);
    }

    #[test]
    fn test_publish_conflicts_are_recognized() {
        let t = tarball();
        let registry = "https://registry.npmjs.org";
        assert!(matches!(
            publish_error(StatusCode::CONFLICT, "", &t, registry),
            RegistryError::AlreadyPublished { .. }
        ));
        assert!(matches!(
            publish_error(
                StatusCode::FORBIDDEN,
                "You cannot publish over the previously published versions: 1.2.3.",
                &t,
                registry
            ),
            RegistryError::AlreadyPublished { .. }
        ));
        assert!(matches!(
            publish_error(StatusCode::FORBIDDEN, "forbidden", &t, registry),
            RegistryError::PublishFailed { .. }
        ));
        assert_eq!(
            publish_error(StatusCode::UNAUTHORIZED, "", &t, registry).code(),
            "EAUTH"
        );
    }

    #[tokio::test]
    async fn test_configured_token_is_used() {
        let registry = NpmRegistry::new(NpmConfig::default().with_token("abc"));
        assert_eq!(registry.token().await.unwrap(), "abc");
    }
}
