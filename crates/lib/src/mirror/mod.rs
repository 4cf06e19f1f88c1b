//! Remote repository mirrors with a local download cache.

use tracing::{debug, info, warn};

use crate::store::ArtifactStore;

/// Fetches repository paths from an ordered list of mirrors, caching hits
/// in the artifact store.
#[derive(Debug, Clone)]
pub struct MirrorClient {
  client: reqwest::Client,
  mirrors: Vec<String>,
  store: ArtifactStore,
}

impl MirrorClient {
  /// Mirror base URLs are normalized to end with `/`.
  pub fn new(mirrors: &[String], store: ArtifactStore) -> Self {
    let mirrors = mirrors
      .iter()
      .map(|m| {
        if m.ends_with('/') {
          m.clone()
        } else {
          format!("{}/", m)
        }
      })
      .collect();
    Self {
      client: reqwest::Client::new(),
      mirrors,
      store,
    }
  }

  pub fn mirrors(&self) -> &[String] {
    &self.mirrors
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  /// Contents of a repository path, from the cache or the first mirror that
  /// returns a non-empty body.
  ///
  /// Transport errors, error statuses and empty bodies move on to the next
  /// mirror. Returns `None` once every mirror has been tried.
  pub async fn fetch(&self, rel_path: &str) -> Option<Vec<u8>> {
    let rel_path = rel_path.trim_start_matches('/');
    if let Some(cached) = self.store.resolve(rel_path).await {
      match tokio::fs::read(&cached).await {
        Ok(bytes) => {
          debug!(path = %rel_path, "serving cached download");
          return Some(bytes);
        }
        Err(e) => warn!(path = %cached.display(), error = %e, "unreadable cached download"),
      }
    }

    for mirror in &self.mirrors {
      let url = format!("{}{}", mirror, rel_path);
      let Some(bytes) = self.get(&url).await else {
        continue;
      };

      info!(url = %url, size = bytes.len(), "fetched from mirror");
      if let Err(e) = self.store.write_cached(rel_path, &bytes).await {
        warn!(path = %rel_path, error = %e, "failed to cache download");
      }
      return Some(bytes);
    }

    debug!(path = %rel_path, "not found on any mirror");
    None
  }

  async fn get(&self, url: &str) -> Option<Vec<u8>> {
    let response = match self.client.get(url).send().await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %url, error = %e, "mirror request failed");
        return None;
      }
    };

    if !response.status().is_success() {
      debug!(url = %url, status = %response.status(), "mirror miss");
      return None;
    }

    match response.bytes().await {
      Ok(bytes) if bytes.is_empty() => {
        debug!(url = %url, "mirror returned empty body");
        None
      }
      Ok(bytes) => Some(bytes.to_vec()),
      Err(e) => {
        warn!(url = %url, error = %e, "failed to read mirror response");
        None
      }
    }
  }
}
