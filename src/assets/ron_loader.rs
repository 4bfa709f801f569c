use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::cob::CobScript;
use crate::data::{
    FeatureDefinition, MovementClassDefinition, UnitDefinition, WeaponDefinition,
};

use super::{AssetError, AssetSource, UnitModel};

/// Reads definitions from a directory tree of RON files:
///
/// ```text
/// root/
///   units/<name>.ron
///   weapons/<name>.ron
///   movement_classes/<name>.ron
///   features/<name>.ron
///   scripts/<name>.ron
///   models/<name>.ron
/// ```
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn load<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<T, AssetError> {
        let path = self.root.join(kind).join(format!("{name}.ron"));
        let display = path.display().to_string();

        if !path.exists() {
            return Err(AssetError::Missing(display));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| AssetError::Io {
            path: display.clone(),
            source,
        })?;
        ron::from_str(&text).map_err(|source| AssetError::Parse {
            path: display,
            source,
        })
    }
}

impl AssetSource for DirectoryAssets {
    fn load_unit_definition(&self, name: &str) -> Result<UnitDefinition, AssetError> {
        self.load("units", name)
    }

    fn load_weapon_definition(&self, name: &str) -> Result<WeaponDefinition, AssetError> {
        self.load("weapons", name)
    }

    fn load_movement_class(&self, name: &str) -> Result<MovementClassDefinition, AssetError> {
        self.load("movement_classes", name)
    }

    fn load_feature_definition(&self, name: &str) -> Result<FeatureDefinition, AssetError> {
        self.load("features", name)
    }

    fn load_script(&self, name: &str) -> Result<CobScript, AssetError> {
        self.load("scripts", name)
    }

    fn load_model(&self, name: &str) -> Result<UnitModel, AssetError> {
        self.load("models", name)
    }
}
