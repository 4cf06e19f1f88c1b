//! HTTP repository proxy.
//!
//! Answers `GET <repository path>` from the artifact store, synthesizing
//! version listings on demand and falling back to remote mirrors for
//! anything that is not built locally.
//!
//! Resolution order for one request:
//! 1. coordinate override rewrite
//! 2. version override rewrite
//! 3. file in the store
//! 4. `maven-metadata.xml` built from the store's version directories
//! 5. 404 for local-only group prefixes
//! 6. first mirror with a non-empty answer, cached into the store

mod metadata;
mod rewrite;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::Utc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use rewrite::rewrite_path;

use crate::config::{Config, ProxyConfig, ResolveConfig};
use crate::consts::METADATA_FILE;
use crate::mirror::MirrorClient;
use crate::store::ArtifactStore;

/// Errors running the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
  #[error("failed to bind repository proxy to {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: std::io::Error,
  },

  #[error("repository proxy failed: {0}")]
  Serve(#[source] std::io::Error),
}

/// Shared state of all request handlers.
#[derive(Debug, Clone)]
pub struct ProxyState {
  resolve: ResolveConfig,
  mirror: MirrorClient,
}

impl ProxyState {
  pub fn new(resolve: ResolveConfig, mirror: MirrorClient) -> Self {
    Self { resolve, mirror }
  }

  pub fn from_config(config: &Config) -> Self {
    let store = ArtifactStore::new(config.paths.repository.clone());
    Self::new(
      config.resolve.clone(),
      MirrorClient::new(&config.proxy.mirrors, store),
    )
  }

  fn store(&self) -> &ArtifactStore {
    self.mirror.store()
  }

  fn is_local_only(&self, path: &str) -> bool {
    self
      .resolve
      .local_prefixes
      .iter()
      .any(|prefix| path.starts_with(&prefix.replace('.', "/")))
  }
}

/// Contents for a repository path, or `None` for a 404.
pub async fn resolve(state: &ProxyState, request_path: &str) -> Option<Vec<u8>> {
  let path = request_path.trim_start_matches('/');
  if path.is_empty() || path.split('/').any(|segment| segment == "..") {
    return None;
  }

  let path = rewrite_path(&state.resolve, path);

  if let Some(file) = state.store().resolve(&path).await {
    debug!(path = %path, "serving from store");
    return tokio::fs::read(&file).await.ok();
  }

  if let Some((artifact_path, METADATA_FILE)) = path.rsplit_once('/')
    && let Some(dir) = state.store().locate(artifact_path)
    && is_dir(&dir).await
  {
    return version_listing(&dir, artifact_path).await;
  }

  if state.is_local_only(&path) {
    debug!(path = %path, "local package not in store");
    return None;
  }

  state.mirror.fetch(&path).await
}

async fn is_dir(path: &Path) -> bool {
  tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn version_listing(dir: &Path, artifact_path: &str) -> Option<Vec<u8>> {
  let versions = metadata::list_versions(dir).await;
  if versions.is_empty() {
    debug!(path = %artifact_path, "no versions to list");
    return None;
  }
  let (group, artifact) = metadata::group_and_artifact(artifact_path)?;
  debug!(group = %group, artifact = %artifact, versions = ?versions, "synthesized version listing");
  Some(metadata::render(&group, &artifact, &versions, Utc::now()).into_bytes())
}

/// The proxy's HTTP routes.
pub fn router(state: Arc<ProxyState>) -> Router {
  Router::new().route("/{*path}", get(handle)).with_state(state)
}

async fn handle(State(state): State<Arc<ProxyState>>, uri: Uri) -> Response {
  info!(path = %uri.path(), "repository request");
  match resolve(&state, uri.path()).await {
    Some(body) => (
      StatusCode::OK,
      [
        (header::CONTENT_TYPE, "text/plain".to_string()),
        (header::CONTENT_LENGTH, body.len().to_string()),
      ],
      body,
    )
      .into_response(),
    None => StatusCode::NOT_FOUND.into_response(),
  }
}

async fn bind(config: &ProxyConfig) -> Result<TcpListener, ProxyError> {
  let addr = format!("{}:{}", config.bind, config.port);
  TcpListener::bind(&addr)
    .await
    .map_err(|source| ProxyError::Bind { addr, source })
}

/// Run the proxy in the foreground until the server fails.
pub async fn serve(config: &ProxyConfig, state: Arc<ProxyState>) -> Result<(), ProxyError> {
  let listener = bind(config).await?;
  info!(addr = %listener.local_addr().map_err(ProxyError::Serve)?, "repository proxy listening");
  axum::serve(listener, router(state)).await.map_err(ProxyError::Serve)
}

/// Bind the proxy and run it as a background task.
pub async fn spawn(config: &ProxyConfig, state: Arc<ProxyState>) -> Result<(SocketAddr, JoinHandle<()>), ProxyError> {
  let listener = bind(config).await?;
  let addr = listener.local_addr().map_err(ProxyError::Serve)?;
  info!(addr = %addr, "repository proxy listening");

  let handle = tokio::spawn(async move {
    if let Err(e) = axum::serve(listener, router(state)).await {
      error!(error = %e, "repository proxy stopped");
    }
  });
  Ok((addr, handle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{Body, to_bytes};
  use axum::http::Request;
  use std::fs;
  use std::path::Path;
  use tempfile::tempdir;
  use tower::ServiceExt;

  fn state(repo: &Path, mirrors: &[String]) -> ProxyState {
    let mut resolve = ResolveConfig::default();
    resolve.local_prefixes = vec!["platform".to_string()];
    resolve
      .coordinate_overrides
      .insert("a.b:C:1.0".parse().unwrap(), "x.y:Z:2.0".parse().unwrap());
    ProxyState::new(resolve, MirrorClient::new(mirrors, ArtifactStore::new(repo.to_path_buf())))
  }

  fn put(repo: &Path, rel: &str, content: &str) {
    let path = repo.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  async fn get(state: ProxyState, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router(Arc::new(state))
      .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = response.status();
    let content_type = response
      .headers()
      .get(header::CONTENT_TYPE)
      .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
    (status, content_type, body)
  }

  #[tokio::test]
  async fn serves_stored_file_as_plain_text() {
    let temp = tempdir().unwrap();
    put(temp.path(), "org/x/lib/1.0/lib-1.0.jar", "jar-bytes");

    let (status, content_type, body) = get(state(temp.path(), &[]), "/org/x/lib/1.0/lib-1.0.jar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    assert_eq!(body, b"jar-bytes");
  }

  #[tokio::test]
  async fn missing_file_is_empty_404() {
    let temp = tempdir().unwrap();
    let (status, _, body) = get(state(temp.path(), &[]), "/org/x/lib/1.0/lib-1.0.jar").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
  }

  #[tokio::test]
  async fn metadata_lists_versions_numerically() {
    let temp = tempdir().unwrap();
    for v in ["1.10", "1.2", "1.0"] {
      put(temp.path(), &format!("org/x/lib/{v}/lib-{v}.pom"), "<project/>");
    }

    let (status, _, body) = get(state(temp.path(), &[]), "/org/x/lib/maven-metadata.xml").await;
    assert_eq!(status, StatusCode::OK);
    let xml = String::from_utf8(body).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let versions: Vec<&str> = doc
      .descendants()
      .filter(|n| n.has_tag_name("version"))
      .filter_map(|n| n.text())
      .collect();
    assert_eq!(versions, vec!["1.0", "1.2", "1.10"]);
    assert!(xml.contains("<groupId>org.x</groupId><artifactId>lib</artifactId>"));
  }

  #[tokio::test]
  async fn metadata_without_versions_is_404() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("org/x/lib/1.0")).unwrap();
    let (status, _, _) = get(state(temp.path(), &[]), "/org/x/lib/maven-metadata.xml").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn local_only_prefix_never_reaches_mirrors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/platform/core/Core/1.0/Core-1.0.pom")
      .with_body("<project/>")
      .expect(0)
      .create_async()
      .await;

    let temp = tempdir().unwrap();
    let state = state(temp.path(), &[server.url()]);
    assert!(resolve(&state, "/platform/core/Core/1.0/Core-1.0.pom").await.is_none());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn falls_back_to_mirror_and_caches() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/org/ext/lib/2/lib-2.jar")
      .with_body("remote")
      .create_async()
      .await;

    let temp = tempdir().unwrap();
    let (status, _, body) = get(state(temp.path(), &[server.url()]), "/org/ext/lib/2/lib-2.jar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"remote");
    assert!(temp.path().join("org/ext/lib/2/lib-2.jar").is_file());
  }

  #[tokio::test]
  async fn overridden_coordinate_is_served() {
    let temp = tempdir().unwrap();
    put(temp.path(), "x/y/Z/2.0/Z-2.0.jar", "replacement");

    let body = resolve(&state(temp.path(), &[]), "/a/b/C/1.0/C-1.0.jar").await;
    assert_eq!(body.as_deref(), Some(&b"replacement"[..]));
  }

  #[tokio::test]
  async fn parent_segments_are_rejected() {
    let temp = tempdir().unwrap();
    put(temp.path(), "secret.txt", "nope");
    let repo = temp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();

    assert!(resolve(&state(&repo, &[]), "/../secret.txt").await.is_none());
    assert!(resolve(&state(&repo, &[]), "/org/../../secret.txt").await.is_none());
  }

  #[tokio::test]
  async fn spawned_proxy_answers_over_tcp() {
    let temp = tempdir().unwrap();
    put(temp.path(), "org/x/lib/1.0/lib-1.0.pom", "<project/>");
    let config = ProxyConfig {
      port: 0,
      mirrors: Vec::new(),
      ..ProxyConfig::default()
    };

    let (addr, handle) = spawn(&config, Arc::new(state(temp.path(), &[]))).await.unwrap();
    let url = format!("http://{}/org/x/lib/1.0/lib-1.0.pom", addr);
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.content_length(), Some(10));
    assert_eq!(response.text().await.unwrap(), "<project/>");

    let missing = reqwest::get(format!("http://{}/org/x/lib/9/lib-9.pom", addr)).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    handle.abort();
  }
}
