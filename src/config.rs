use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{LayoutConfig, Toolbox, TreemapError};

/// How the tree map is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Self-contained HTML page (`tmap.html`).
    #[default]
    Interactive,
    /// SVG image (`tmap.svg`).
    Static,
}

/// What to do with a compound whose structure or descriptor fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Warn and leave the row out (or record a missing descriptor value).
    #[default]
    Skip,
    /// Fail the whole run with a data error.
    Strict,
}

/// Every parameter of one tree map run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreemapConfig {
    pub library: PathBuf,
    pub output: PathBuf,
    pub fingerprint: String,
    pub dimension: usize,
    pub descriptors: Vec<String>,
    pub features: Option<PathBuf>,
    pub render_mode: RenderMode,
    pub seed: u64,
    pub neighbours: usize,
    pub trees: usize,
    pub row_policy: RowPolicy,
}

impl Default for TreemapConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::new(),
            output: PathBuf::new(),
            fingerprint: "MHFP6".to_string(),
            dimension: 1024,
            descriptors: Vec::new(),
            features: None,
            render_mode: RenderMode::Interactive,
            seed: 42,
            neighbours: 10,
            trees: 8,
            row_policy: RowPolicy::Skip,
        }
    }
}

impl TreemapConfig {
    pub fn new(library: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from YAML. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TreemapError> {
        let path = path.as_ref();
        let serialized = std::fs::read_to_string(path).map_err(TreemapError::io(path))?;
        Ok(serde_yaml::from_str(&serialized)?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), TreemapError> {
        let path = path.as_ref();
        let serialized = serde_yaml::to_string(self)?;
        std::fs::write(path, serialized).map_err(TreemapError::io(path))
    }

    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            k: self.neighbours,
            ..LayoutConfig::default()
        }
    }

    /// Check every field before any work starts, including that the
    /// fingerprint and descriptor names exist in `toolbox`.
    pub fn validate(&self, toolbox: &Toolbox) -> Result<(), TreemapError> {
        if self.library.as_os_str().is_empty() {
            return Err(TreemapError::Config("a library file is required".to_string()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(TreemapError::Config("an output directory is required".to_string()));
        }
        if self.dimension == 0 {
            return Err(TreemapError::Config("dimension must be positive".to_string()));
        }
        if self.neighbours == 0 {
            return Err(TreemapError::Config("neighbour count must be positive".to_string()));
        }
        if self.trees == 0 || self.trees > self.dimension {
            return Err(TreemapError::Config(format!(
                "tree count must be between 1 and the dimension ({}), got {}",
                self.dimension, self.trees
            )));
        }
        toolbox.fingerprints.get(&self.fingerprint)?;
        for descriptor in &self.descriptors {
            toolbox.descriptors.get(descriptor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreemapConfig::new("lib.csv", "out");
        assert_eq!(config.fingerprint, "MHFP6");
        assert_eq!(config.dimension, 1024);
        assert_eq!(config.render_mode, RenderMode::Interactive);
        assert_eq!(config.row_policy, RowPolicy::Skip);
        assert_eq!(config.layout_config().k, 10);
        assert!(config.validate(&Toolbox::builtin()).is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let toolbox = Toolbox::builtin();
        let base = TreemapConfig::new("lib.csv", "out");

        let mut config = base.clone();
        config.dimension = 0;
        assert!(matches!(config.validate(&toolbox), Err(TreemapError::Config(_))));

        let mut config = base.clone();
        config.trees = 2048;
        assert!(matches!(config.validate(&toolbox), Err(TreemapError::Config(_))));

        let mut config = base.clone();
        config.fingerprint = "MACCS".to_string();
        assert!(matches!(config.validate(&toolbox), Err(TreemapError::Lookup { .. })));

        let mut config = base.clone();
        config.descriptors = vec!["MolWeight".to_string(), "TPSA".to_string()];
        assert!(matches!(config.validate(&toolbox), Err(TreemapError::Lookup { name, .. }) if name == "TPSA"));

        assert!(TreemapConfig::default().validate(&toolbox).is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmap.yaml");
        std::fs::write(
            &path,
            "library: lib.csv\noutput: out\nfingerprint: ECFP4\ndescriptors: [MolWeight]\nrender_mode: static\nrow_policy: strict\n",
        )
        .unwrap();
        let config = TreemapConfig::from_file(&path).unwrap();
        assert_eq!(config.fingerprint, "ECFP4");
        assert_eq!(config.dimension, 1024);
        assert_eq!(config.descriptors, vec!["MolWeight".to_string()]);
        assert_eq!(config.render_mode, RenderMode::Static);
        assert_eq!(config.row_policy, RowPolicy::Strict);

        let copy = dir.path().join("copy.yaml");
        config.to_file(&copy).unwrap();
        assert_eq!(TreemapConfig::from_file(&copy).unwrap(), config);

        std::fs::write(&path, "dimension: lots\n").unwrap();
        assert!(matches!(TreemapConfig::from_file(&path), Err(TreemapError::Yaml(_))));
    }
}
