//! Utilities for fetching model artifacts from HuggingFace Hub, HTTP URLs or
//! local directories.
//!
//! HTTP downloads are cached in `~/.cache/vieneu/`; Hub files use the hf-hub cache.

use anyhow::{Context, Result};
use hf_hub::api::sync::{Api, ApiRepo};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Create the cache directory if it doesn't exist.
///
/// Returns the path to `~/.cache/vieneu/`.
pub fn make_cache_directory() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    let cache_dir = Path::new(&home).join(".cache").join("vieneu");
    fs::create_dir_all(&cache_dir)?;
    Ok(cache_dir)
}

/// Download a file if it's a remote URL, or return the local path unchanged.
///
/// Supports these path formats:
/// - `hf://owner/repo/path/to/file.bin` - HuggingFace Hub
/// - `hf://owner/repo/path/to/file.bin@revision` - HuggingFace with specific revision
/// - `https://example.com/file.bin` - Direct HTTP download
/// - `/local/path/file.bin` - Local file (returned as-is)
pub fn download_if_necessary(path: &str) -> Result<PathBuf> {
    if let Some(stripped) = path.strip_prefix("hf://") {
        let (repo_id, filename, revision) = parse_hf_path(stripped)?;
        let repo = ModelRepo::resolve(&repo_id, revision.as_deref().unwrap_or("main"))?;
        return repo.get(&filename);
    }

    if path.starts_with("http://") || path.starts_with("https://") {
        return download_http(path);
    }

    let local = PathBuf::from(path);
    if !local.exists() {
        anyhow::bail!("No such file or directory: {path}");
    }
    Ok(local)
}

/// A model repository: either a local directory or a HuggingFace Hub repo.
pub enum ModelRepo {
    /// Files are read from this directory.
    Local(PathBuf),
    /// Files are fetched (and cached) through hf-hub.
    Hub {
        /// `owner/name` identifier.
        repo_id: String,
        /// Handle onto the remote repository.
        api: ApiRepo,
    },
}

impl std::fmt::Debug for ModelRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelRepo::Local(dir) => f.debug_tuple("Local").field(dir).finish(),
            ModelRepo::Hub { repo_id, .. } => f.debug_tuple("Hub").field(repo_id).finish(),
        }
    }
}

impl ModelRepo {
    /// Resolve a repository identifier. Existing directories win over Hub ids.
    pub fn resolve(repo_id: &str, revision: &str) -> Result<Self> {
        let local = Path::new(repo_id);
        if local.is_dir() {
            return Ok(ModelRepo::Local(local.to_path_buf()));
        }
        if repo_id.split('/').filter(|part| !part.is_empty()).count() != 2 {
            anyhow::bail!(
                "Invalid model repository '{repo_id}': expected 'owner/name' or an existing directory"
            );
        }
        let api = Api::new()?.repo(hf_hub::Repo::with_revision(
            repo_id.to_string(),
            hf_hub::RepoType::Model,
            revision.to_string(),
        ));
        Ok(ModelRepo::Hub {
            repo_id: repo_id.to_string(),
            api,
        })
    }

    /// Human-readable identifier used in messages.
    pub fn id(&self) -> String {
        match self {
            ModelRepo::Local(dir) => dir.display().to_string(),
            ModelRepo::Hub { repo_id, .. } => repo_id.clone(),
        }
    }

    /// Path to `filename` inside the repository, downloading it if needed.
    pub fn get(&self, filename: &str) -> Result<PathBuf> {
        match self {
            ModelRepo::Local(dir) => {
                let path = dir.join(filename);
                if !path.exists() {
                    anyhow::bail!("No such file or directory: {}", path.display());
                }
                Ok(path)
            }
            ModelRepo::Hub { repo_id, api } => {
                tracing::debug!(repo = %repo_id, file = filename, "fetching from hub");
                api.get(filename)
                    .with_context(|| format!("Failed to fetch {filename} from {repo_id}"))
            }
        }
    }

    /// Weight files of the repository: a single `model.safetensors` or every
    /// shard listed in `model.safetensors.index.json`.
    pub fn safetensors(&self) -> Result<Vec<PathBuf>> {
        if let Ok(single) = self.get("model.safetensors") {
            return Ok(vec![single]);
        }
        let index = self
            .get("model.safetensors.index.json")
            .with_context(|| format!("No safetensors weights found in {}", self.id()))?;
        let shards = shard_files(&fs::read_to_string(&index)?)?;
        shards.iter().map(|file| self.get(file)).collect()
    }
}

/// Distinct shard file names listed in a safetensors index.
fn shard_files(index_json: &str) -> Result<Vec<String>> {
    let json: serde_json::Value = serde_json::from_str(index_json)?;
    let weight_map = match json.get("weight_map") {
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => anyhow::bail!("weight_map in safetensors index is not a map"),
        None => anyhow::bail!("No weight_map in safetensors index"),
    };
    let files = weight_map
        .values()
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect::<BTreeSet<_>>();
    Ok(files.into_iter().collect())
}

/// Download a file from an HTTP(S) URL to the cache directory.
fn download_http(url: &str) -> Result<PathBuf> {
    let cache_dir = make_cache_directory()?;

    let filename = url_to_cache_filename(url);
    let cache_path = cache_dir.join(&filename);

    if cache_path.exists() {
        return Ok(cache_path);
    }

    eprintln!("Downloading {url}...");

    let response = ureq::get(url)
        .call()
        .map_err(|e| anyhow::anyhow!("Failed to download {url}: {e}"))?;

    let mut data = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut data)
        .map_err(|e| anyhow::anyhow!("Failed to read response: {e}"))?;

    // Write to a temporary file first, then rename into place.
    let temp_path = cache_path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, &cache_path)?;

    eprintln!("Downloaded to {}", cache_path.display());
    Ok(cache_path)
}

/// Convert a URL to a safe cache filename.
fn url_to_cache_filename(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    stripped
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '?' | '&' | '=' | '#' => '_',
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' => c,
            _ => '_',
        })
        .collect()
}

/// Parse `owner/repo/path@rev` into components for HuggingFace downloads.
fn parse_hf_path(path: &str) -> Result<(String, String, Option<String>)> {
    let mut parts = path.split('/').collect::<Vec<_>>();
    if parts.len() < 3 {
        anyhow::bail!("Invalid hf:// path: {path}");
    }
    let repo_id = format!("{}/{}", parts.remove(0), parts.remove(0));
    let filename = parts.join("/");

    if let Some((file, rev)) = filename.split_once('@') {
        return Ok((repo_id, file.to_string(), Some(rev.to_string())));
    }

    Ok((repo_id, filename, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_rejects_invalid_hf_path() {
        let err = download_if_necessary("hf://too-short").unwrap_err();
        assert!(err.to_string().contains("Invalid hf:// path"));
    }

    #[test]
    fn download_accepts_existing_local_path() {
        let path = download_if_necessary("Cargo.toml").unwrap();
        assert!(path.ends_with("Cargo.toml"));
    }

    #[test]
    fn download_rejects_missing_local_path() {
        let err = download_if_necessary("tests/fixtures/missing_local_file.bin").unwrap_err();
        assert!(err.to_string().to_lowercase().contains("no such file"));
    }

    #[test]
    fn parse_hf_path_splits_revision() {
        let (repo, file, rev) = parse_hf_path("owner/repo/sub/model.onnx@v2").unwrap();
        assert_eq!(repo, "owner/repo");
        assert_eq!(file, "sub/model.onnx");
        assert_eq!(rev.as_deref(), Some("v2"));
    }

    #[test]
    fn url_to_cache_filename_handles_special_chars() {
        assert_eq!(
            url_to_cache_filename("https://example.com/path/to/file.bin"),
            "example.com_path_to_file.bin"
        );
        assert_eq!(
            url_to_cache_filename("https://example.com/file?query=1&other=2"),
            "example.com_file_query_1_other_2"
        );
    }

    #[test]
    fn local_repo_serves_files_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"x").unwrap();
        let repo = ModelRepo::resolve(dir.path().to_str().unwrap(), "main").unwrap();
        assert!(matches!(repo, ModelRepo::Local(_)));
        assert_eq!(repo.safetensors().unwrap().len(), 1);
        assert!(repo.get("tokenizer.json").is_err());
    }

    #[test]
    fn resolve_rejects_malformed_repo_ids() {
        let err = ModelRepo::resolve("not-a-repo-or-dir", "main").unwrap_err();
        assert!(err.to_string().contains("Invalid model repository"));
    }

    #[test]
    fn shard_files_are_deduplicated() {
        let index = r#"{"metadata":{},"weight_map":{"a":"model-00001.safetensors","b":"model-00002.safetensors","c":"model-00001.safetensors"}}"#;
        let files = shard_files(index).unwrap();
        assert_eq!(
            files,
            vec!["model-00001.safetensors", "model-00002.safetensors"]
        );
        assert!(shard_files(r#"{"weight_map": []}"#).is_err());
    }
}
