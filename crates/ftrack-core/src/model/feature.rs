use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Metadata key holding the branch a feature is bound to.
pub const BRANCH_KEY: &str = "branch";

/// A trackable unit of work.
///
/// The lifecycle state is derived from the current version's timestamps and
/// never stored. The current version is the one with the greatest key; the
/// versions map is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Stable opaque identifier.
    pub id: String,

    /// Human readable name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Paths linked to this feature, relative to the repository root.
    #[serde(default)]
    pub files: Vec<String>,

    /// Free-form metadata; includes the `branch` binding.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(with = "version_keys")]
    pub versions: BTreeMap<u32, FeatureVersion>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// One line of work for a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVersion {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl FeatureVersion {
    fn started(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            modified_at: now,
            closed_at: None,
            branch: None,
            notes: String::new(),
            authors: Vec::new(),
        }
    }
}

/// A directed edge to another feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: String,
    pub target: String,
}

/// Derived lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureState {
    /// Created and untouched since.
    Open,
    /// Modified after creation, not closed.
    InProgress,
    /// Closed.
    Closed,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureState::Open => "open",
            FeatureState::InProgress => "in-progress",
            FeatureState::Closed => "closed",
        }
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(FeatureState::Open),
            "in-progress" => Ok(FeatureState::InProgress),
            "closed" => Ok(FeatureState::Closed),
            _ => Err(format!("invalid feature state: {}", s)),
        }
    }
}

impl Feature {
    /// Creates a feature with a fresh ID and a single version starting now.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().simple().to_string(), name, Utc::now())
    }

    /// Creates a feature with an explicit ID and creation time.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(1, FeatureVersion::started(now));
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            files: Vec::new(),
            metadata: BTreeMap::new(),
            versions,
            relationships: Vec::new(),
        }
    }

    /// Key of the current (greatest) version.
    pub fn current_key(&self) -> u32 {
        self.versions.keys().next_back().copied().unwrap_or(1)
    }

    /// The current version.
    ///
    /// # Panics
    ///
    /// Panics if `versions` has been emptied by hand. Records loaded from
    /// disk and features built with [`Feature::new`] always have a version.
    pub fn current_version(&self) -> &FeatureVersion {
        self.versions
            .values()
            .next_back()
            .expect("feature has at least one version")
    }

    /// Mutable access to the current version. An emptied `versions` map gets
    /// a fresh version starting now.
    pub fn current_version_mut(&mut self) -> &mut FeatureVersion {
        let key = self.current_key();
        self.versions
            .entry(key)
            .or_insert_with(|| FeatureVersion::started(Utc::now()))
    }

    /// Derived lifecycle state of the current version.
    pub fn state(&self) -> FeatureState {
        let version = self.current_version();
        if version.closed_at.is_some() {
            FeatureState::Closed
        } else if version.modified_at > version.created_at {
            FeatureState::InProgress
        } else {
            FeatureState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == FeatureState::Closed
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.current_version().modified_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.current_version().created_at
    }

    /// Branch binding: the metadata entry, else the current version's branch.
    pub fn branch(&self) -> Option<&str> {
        self.metadata
            .get(BRANCH_KEY)
            .map(String::as_str)
            .or(self.current_version().branch.as_deref())
    }

    /// Binds the feature (and its current version) to a branch.
    pub fn set_branch(&mut self, branch: impl Into<String>) {
        let branch = branch.into();
        self.metadata.insert(BRANCH_KEY.to_string(), branch.clone());
        self.current_version_mut().branch = Some(branch);
    }

    /// Records activity at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.current_version_mut().modified_at = now;
    }

    /// Closes the current version at `now`.
    pub fn close(&mut self, now: DateTime<Utc>) {
        let version = self.current_version_mut();
        version.closed_at = Some(now);
        version.modified_at = now;
    }

    /// Clears the closing timestamp of the current version.
    pub fn reopen(&mut self) {
        self.current_version_mut().closed_at = None;
    }

    /// Adds an author to the current version if not already listed.
    pub fn add_author(&mut self, author: &str) {
        let authors = &mut self.current_version_mut().authors;
        if !authors.iter().any(|a| a == author) {
            authors.push(author.to_string());
        }
    }

    /// Links a file path; returns `false` if it was already linked.
    pub fn link_file(&mut self, path: &str) -> bool {
        if self.files.iter().any(|f| f == path) {
            return false;
        }
        self.files.push(path.to_string());
        true
    }

    /// Adds a relationship unless an identical one exists.
    pub fn add_relationship(&mut self, kind: &str, target: &str) -> bool {
        if self
            .relationships
            .iter()
            .any(|r| r.kind == kind && r.target == target)
        {
            return false;
        }
        self.relationships.push(Relationship {
            kind: kind.to_string(),
            target: target.to_string(),
        });
        true
    }
}

/// Ephemeral projection of a feature found on some branch. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossBranchFeature {
    pub feature: Feature,
    pub branch: String,
    pub is_remote: bool,
}

/// TOML tables need string keys; versions are keyed by their decimal number.
mod version_keys {
    use super::FeatureVersion;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        versions: &BTreeMap<u32, FeatureVersion>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        versions
            .iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u32, FeatureVersion>, D::Error> {
        let raw = BTreeMap::<String, FeatureVersion>::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(D::Error::custom("feature has no versions"));
        }
        raw.into_iter()
            .map(|(k, v)| {
                k.parse::<u32>()
                    .map(|key| (key, v))
                    .map_err(|_| D::Error::custom(format!("invalid version key '{}'", k)))
            })
            .collect()
    }
}
