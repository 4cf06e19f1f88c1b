//! Version listings (`maven-metadata.xml`) synthesized from the store.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::consts::DESCRIPTOR_EXT;
use crate::version::compare_version_strings;

/// Versions under an artifact directory: subdirectories holding a descriptor,
/// lowest first.
pub async fn list_versions(artifact_dir: &Path) -> Vec<String> {
  let Ok(mut entries) = fs::read_dir(artifact_dir).await else {
    return Vec::new();
  };

  let mut versions = Vec::new();
  while let Ok(Some(entry)) = entries.next_entry().await {
    if !entry.file_type().await.is_ok_and(|t| t.is_dir()) || !has_descriptor(&entry.path()).await {
      continue;
    }
    if let Some(name) = entry.file_name().to_str() {
      versions.push(name.to_string());
    }
  }
  versions.sort_by(|a, b| compare_version_strings(a, b));
  versions
}

async fn has_descriptor(dir: &Path) -> bool {
  let Ok(mut entries) = fs::read_dir(dir).await else {
    return false;
  };
  while let Ok(Some(entry)) = entries.next_entry().await {
    if entry.path().extension().is_some_and(|ext| ext == DESCRIPTOR_EXT) {
      return true;
    }
  }
  false
}

/// Split an artifact directory path (`org/example/lib`) into group and artifact.
pub fn group_and_artifact(artifact_path: &str) -> Option<(String, String)> {
  let parts: Vec<&str> = artifact_path.trim_matches('/').split('/').collect();
  match parts.split_last() {
    Some((artifact, group)) if !group.is_empty() && !artifact.is_empty() => {
      Some((group.join("."), artifact.to_string()))
    }
    _ => None,
  }
}

/// Render the listing document.
pub fn render(group: &str, artifact: &str, versions: &[String], updated: DateTime<Utc>) -> String {
  let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>");
  xml.push_str(&format!("<groupId>{}</groupId>", escape(group)));
  xml.push_str(&format!("<artifactId>{}</artifactId>", escape(artifact)));
  xml.push_str("<versioning><versions>");
  for version in versions {
    xml.push_str(&format!("<version>{}</version>", escape(version)));
  }
  xml.push_str("</versions>");
  xml.push_str(&format!("<lastUpdated>{}</lastUpdated>", updated.format("%Y%m%d%H%M%S")));
  xml.push_str("</versioning></metadata>");
  xml
}

fn escape(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}
