//! Profile registry: the validated, immutable roster of agent profiles.
//!
//! Profiles come from an external source (a directory of JSON files, or a
//! literal list in tests). The registry validates each profile's fields,
//! rejects duplicate ids, and cross-checks that every social connection
//! points at a roster member, so malformed personas fail at startup
//! rather than mid-run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use hearthside_types::{AgentId, AgentProfile};

use crate::error::RegistryError;

/// Validated mapping from agent id to profile. Immutable after creation.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<AgentId, Arc<AgentProfile>>,
}

impl ProfileRegistry {
    /// Build a registry from an in-memory profile list.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] found: invalid field values,
    /// duplicate ids, dangling social connections, or an empty roster.
    pub fn from_profiles(profiles: Vec<AgentProfile>) -> Result<Self, RegistryError> {
        if profiles.is_empty() {
            return Err(RegistryError::EmptyRoster);
        }

        let mut map: BTreeMap<AgentId, Arc<AgentProfile>> = BTreeMap::new();
        for profile in profiles {
            profile.validate()?;
            let id = profile.id.clone();
            if map.insert(id.clone(), Arc::new(profile)).is_some() {
                return Err(RegistryError::Duplicate { id });
            }
        }

        for profile in map.values() {
            for connection in &profile.social_connections {
                if !map.contains_key(connection) {
                    return Err(RegistryError::UnknownConnection {
                        id: profile.id.clone(),
                        missing: connection.clone(),
                    });
                }
            }
        }

        tracing::info!(roster = map.len(), "profile registry loaded");
        Ok(Self { profiles: map })
    }

    /// Load every `*.json` file in a directory as one profile each.
    ///
    /// Files are read in name order so load failures are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] or [`RegistryError::Parse`] for a bad
    /// file, plus everything [`Self::from_profiles`] can return.
    pub fn load_dir(dir: &Path) -> Result<Self, RegistryError> {
        let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut profiles = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
            let profile: AgentProfile =
                serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
                    path: path.clone(),
                    source,
                })?;
            profiles.push(profile);
        }

        Self::from_profiles(profiles)
    }

    /// Look up one profile.
    pub fn get(&self, id: &AgentId) -> Option<&Arc<AgentProfile>> {
        self.profiles.get(id)
    }

    /// All profiles in id order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<AgentProfile>> {
        self.profiles.values()
    }

    /// All agent ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &AgentId> {
        self.profiles.keys()
    }

    /// Roster size.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the roster is empty (never true for a constructed registry).
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
