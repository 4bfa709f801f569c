//! Asset loading seams.
//!
//! The simulation consumes definitions in their in-memory shapes; where
//! they come from is behind [`AssetSource`]. The shipped implementation
//! reads RON files from a directory tree; the legacy binary formats are an
//! external concern and deliberately not modelled here.

use serde::Deserialize;
use thiserror::Error;

use crate::cob::CobScript;
use crate::data::{
    FeatureDefinition, GameDatabase, LoadError, MovementClassDefinition, UnitDefinition,
    UnitModelDefinition, UnitPieceDefinition, WeaponDefinition,
};
use crate::fixed_math::SimScalar;

pub use ron_loader::DirectoryAssets;

mod ron_loader;

/// A model as a loader produces it: piece tree by name, parents unresolved.
#[derive(Clone, Debug, Deserialize)]
pub struct UnitModel {
    pub height: SimScalar,
    pub pieces: Vec<UnitPieceDefinition>,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset {0} not found")]
    Missing(String),
    #[error("failed reading asset {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed parsing asset {path}: {source}")]
    Parse {
        path: String,
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    Content(#[from] LoadError),
}

/// An opaque provider of game content.
pub trait AssetSource {
    fn load_unit_definition(&self, name: &str) -> Result<UnitDefinition, AssetError>;
    fn load_weapon_definition(&self, name: &str) -> Result<WeaponDefinition, AssetError>;
    fn load_movement_class(&self, name: &str) -> Result<MovementClassDefinition, AssetError>;
    fn load_feature_definition(&self, name: &str) -> Result<FeatureDefinition, AssetError>;
    fn load_script(&self, name: &str) -> Result<CobScript, AssetError>;
    fn load_model(&self, name: &str) -> Result<UnitModel, AssetError>;
}

/// Loads the named unit types plus everything they reference, validates the
/// lot, and returns a database ready for a simulation.
pub fn build_database(
    source: &impl AssetSource,
    unit_types: &[&str],
) -> Result<GameDatabase, AssetError> {
    let mut db = GameDatabase::new();

    for unit_type in unit_types {
        let def = source.load_unit_definition(unit_type)?;

        for weapon in def
            .weapons
            .iter()
            .chain(def.explode_as.as_ref())
        {
            db.add_weapon_definition(weapon, source.load_weapon_definition(weapon)?);
        }

        if let Some(class) = &def.movement_class {
            db.add_movement_class(source.load_movement_class(class)?);
        }

        if let Some(corpse) = &def.corpse {
            db.add_feature_definition(corpse, source.load_feature_definition(corpse)?);
        }

        let model = source.load_model(&def.object_name)?;
        db.add_model(
            &def.object_name,
            UnitModelDefinition::new(&def.object_name, model.height, model.pieces)?,
        );

        db.add_script(unit_type, source.load_script(unit_type)?);
        db.add_unit_definition(def);
    }

    db.finalise()?;
    Ok(db)
}
