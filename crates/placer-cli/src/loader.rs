// crates/placer-cli/src/loader.rs
// ============================================================================
// Module: File Loaders
// Description: Policy directory scanner and JSON user/secret loaders.
// Purpose: Implement the engine's loader interfaces over local files.
// Dependencies: placer-core, serde_json
// ============================================================================

//! ## Overview
//! Policy objects live as JSON files in a directory; the scan reads every
//! `.json` file in sorted order and returns all objects or fails as a
//! whole, so the engine never sees a half-loaded policy. Users and secrets
//! come from single JSON files implementing the core loader interfaces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use placer_core::PolicyObject;
use placer_core::SecretLoader;
use placer_core::User;
use placer_core::UserLoader;
use placer_core::UserLoaderError;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a single policy object file in bytes.
const MAX_OBJECT_FILE_SIZE: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy loading errors.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A directory or file could not be read.
    #[error("cannot read '{path}': {message}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O message.
        message: String,
    },
    /// An object file exceeds the size limit.
    #[error("policy file '{path}' exceeds size limit ({size} > {MAX_OBJECT_FILE_SIZE} bytes)")]
    TooLarge {
        /// Offending path.
        path: String,
        /// Actual file size in bytes.
        size: u64,
    },
    /// An object file is not a valid policy object.
    #[error("cannot parse policy file '{path}': {message}")]
    Parse {
        /// Offending path.
        path: String,
        /// Parser message.
        message: String,
    },
}

// ============================================================================
// SECTION: Policy Directory Scan
// ============================================================================

/// Loads every policy object under a directory, atomically.
///
/// Files ending in `.json` are read in sorted path order. Each file holds
/// either one object or an array of objects.
///
/// # Errors
///
/// Returns [`LoaderError`] on the first unreadable or malformed file; no
/// partial result is ever returned.
pub fn load_policy_objects(dir: &Path) -> Result<Vec<PolicyObject>, LoaderError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let entries = fs::read_dir(dir).map_err(|error| LoaderError::Io {
        path: dir.display().to_string(),
        message: error.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|error| LoaderError::Io {
            path: dir.display().to_string(),
            message: error.to_string(),
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut objects = Vec::new();
    for path in paths {
        objects.extend(load_object_file(&path)?);
    }
    Ok(objects)
}

/// Loads one object file holding a single object or an array.
fn load_object_file(path: &Path) -> Result<Vec<PolicyObject>, LoaderError> {
    let display = path.display().to_string();
    let metadata = fs::metadata(path).map_err(|error| LoaderError::Io {
        path: display.clone(),
        message: error.to_string(),
    })?;
    if metadata.len() > MAX_OBJECT_FILE_SIZE {
        return Err(LoaderError::TooLarge {
            path: display,
            size: metadata.len(),
        });
    }

    let raw = fs::read_to_string(path).map_err(|error| LoaderError::Io {
        path: display.clone(),
        message: error.to_string(),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|error| LoaderError::Parse {
            path: display.clone(),
            message: error.to_string(),
        })?;

    let values = match value {
        serde_json::Value::Array(values) => values,
        other => vec![other],
    };

    let mut objects = Vec::with_capacity(values.len());
    for value in values {
        let object = PolicyObject::from_value(value).map_err(|error| LoaderError::Parse {
            path: display.clone(),
            message: error.to_string(),
        })?;
        objects.push(object);
    }
    Ok(objects)
}

// ============================================================================
// SECTION: User Loader
// ============================================================================

/// User loader reading a JSON array of users from one file.
pub struct FileUserLoader {
    /// Users keyed by id.
    users: BTreeMap<String, User>,
}

impl FileUserLoader {
    /// Loads the user file eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] when the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, LoaderError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|error| LoaderError::Io {
            path: display.clone(),
            message: error.to_string(),
        })?;
        let users: Vec<User> =
            serde_json::from_str(&raw).map_err(|error| LoaderError::Parse {
                path: display,
                message: error.to_string(),
            })?;
        Ok(Self {
            users: users.into_iter().map(|user| (user.id.clone(), user)).collect(),
        })
    }
}

impl UserLoader for FileUserLoader {
    fn load_user(&self, id: &str) -> Result<Option<User>, UserLoaderError> {
        Ok(self.users.get(id).cloned())
    }

    fn load_users(&self) -> Result<Vec<User>, UserLoaderError> {
        Ok(self.users.values().cloned().collect())
    }
}

// ============================================================================
// SECTION: Secret Loader
// ============================================================================

/// Secret loader reading `{user_id: {key: value}}` from one JSON file.
///
/// A missing file behaves as an empty secret store.
pub struct FileSecretLoader {
    /// Secrets keyed by user id.
    secrets: BTreeMap<String, BTreeMap<String, String>>,
}

impl FileSecretLoader {
    /// Loads the secrets file; absent files yield an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] when an existing file is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, LoaderError> {
        let Some(path) = path else {
            return Ok(Self {
                secrets: BTreeMap::new(),
            });
        };
        if !path.exists() {
            return Ok(Self {
                secrets: BTreeMap::new(),
            });
        }

        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|error| LoaderError::Io {
            path: display.clone(),
            message: error.to_string(),
        })?;
        let secrets = serde_json::from_str(&raw).map_err(|error| LoaderError::Parse {
            path: display,
            message: error.to_string(),
        })?;
        Ok(Self {
            secrets,
        })
    }
}

impl SecretLoader for FileSecretLoader {
    fn load_secrets(&self, user_id: &str) -> Result<BTreeMap<String, String>, UserLoaderError> {
        Ok(self.secrets.get(user_id).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scan_reads_objects_from_sorted_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("20-service.json"),
            json!({
                "metadata": {"namespace": "main", "kind": "service", "name": "web"},
                "bundle": "web-bundle",
                "contexts": []
            })
            .to_string(),
        )
        .expect("write");
        fs::write(
            dir.path().join("10-bundle.json"),
            json!([{
                "metadata": {"namespace": "main", "kind": "bundle", "name": "web-bundle"},
                "components": []
            }])
            .to_string(),
        )
        .expect("write");
        fs::write(dir.path().join("ignored.txt"), "not json").expect("write");

        let objects = load_policy_objects(dir.path()).expect("scan");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].metadata().name, "web-bundle");
        assert_eq!(objects[1].metadata().name, "web");
    }

    #[test]
    fn one_malformed_file_fails_the_whole_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("good.json"),
            json!({
                "metadata": {"namespace": "main", "kind": "bundle", "name": "b"},
                "components": []
            })
            .to_string(),
        )
        .expect("write");
        fs::write(dir.path().join("bad.json"), "{ not json").expect("write");

        assert!(matches!(
            load_policy_objects(dir.path()),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn user_loader_reads_users_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.json");
        fs::write(
            &path,
            json!([
                {"id": "alice", "name": "Alice", "labels": {"team": "dev"}},
                {"id": "root", "name": "Root", "admin": true}
            ])
            .to_string(),
        )
        .expect("write");

        let loader = FileUserLoader::load(&path).expect("load");
        let alice = loader.load_user("alice").expect("query").expect("present");
        assert_eq!(alice.labels.get("team"), Some("dev"));
        assert!(loader.load_user("ghost").expect("query").is_none());
        assert_eq!(loader.load_users().expect("all").len(), 2);
    }

    #[test]
    fn missing_secret_file_yields_an_empty_store() {
        let loader =
            FileSecretLoader::load(Some(Path::new("/nonexistent/secrets.json"))).expect("load");
        assert!(loader.load_secrets("alice").expect("query").is_empty());
    }
}
