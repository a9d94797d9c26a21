use crate::error::{FtrackError, Result};
use crate::model::Feature;
use crate::store::{FeatureFilter, FeatureStore, is_record_path, parse_record, render_record};
use crate::tools::fs::FsAdapter;
use std::path::PathBuf;
use std::sync::Arc;

/// Feature store writing TOML records through an [`FsAdapter`].
pub struct FileFeatureStore {
    dir: PathBuf,
    fs: Arc<dyn FsAdapter>,
}

impl FileFeatureStore {
    pub fn new(dir: PathBuf, fs: Arc<dyn FsAdapter>) -> Self {
        Self { dir, fs }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, super::RECORD_EXT))
    }
}

impl std::fmt::Debug for FileFeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFeatureStore")
            .field("dir", &self.dir)
            .finish()
    }
}

impl FeatureStore for FileFeatureStore {
    fn create(&self, feature: &Feature) -> Result<()> {
        let path = self.record_path(&feature.id);
        if self.fs.exists(&path) {
            return Err(FtrackError::FeatureAlreadyExists(feature.id.clone()));
        }
        self.fs.write(&path, &render_record(feature)?)
    }

    fn get(&self, id: &str) -> Result<Feature> {
        let path = self.record_path(id);
        let content = match self.fs.read_to_string(&path) {
            Err(FtrackError::PathNotFound(_)) => return Err(FtrackError::not_found(id)),
            other => other?,
        };
        parse_record(&path, &content)
    }

    fn update(&self, feature: &Feature) -> Result<()> {
        self.fs
            .write(&self.record_path(&feature.id), &render_record(feature)?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        match self.fs.remove_file(&self.record_path(id)) {
            Err(FtrackError::PathNotFound(_)) => Err(FtrackError::not_found(id)),
            other => other,
        }
    }

    fn list(&self, filter: FeatureFilter) -> Result<Vec<Feature>> {
        if !self.fs.exists(&self.dir) {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = self
            .fs
            .list_dir(&self.dir)?
            .into_iter()
            .filter(|name| is_record_path(name))
            .collect();
        names.sort();

        let mut features = Vec::with_capacity(names.len());
        for name in names {
            let path = self.dir.join(&name);
            let feature = parse_record(&path, &self.fs.read_to_string(&path)?)?;
            if filter.matches(&feature) {
                features.push(feature);
            }
        }
        Ok(features)
    }
}
