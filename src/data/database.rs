use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::cob::CobScript;
use crate::collections::Grid;
use crate::ids::MovementClassId;

use super::{
    parse_yard_map, FeatureDefinition, MovementClassDefinition, UnitDefinition,
    UnitModelDefinition, WeaponDefinition, YardMapCell, DEFAULT_DAMAGE_KEY,
};

/// Content errors surfaced at game load. Any of these refuses to start the
/// game; none of them can occur after [`GameDatabase::finalise`] succeeds.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unit {unit}: model {model} is not loaded")]
    MissingModel { unit: String, model: String },
    #[error("unit {unit}: no script loaded")]
    MissingScript { unit: String },
    #[error("unit {unit}: weapon {weapon} is not loaded")]
    MissingWeapon { unit: String, weapon: String },
    #[error("unit {unit}: movement class {class} is not loaded")]
    MissingMovementClass { unit: String, class: String },
    #[error("unit {unit}: corpse feature {feature} is not loaded")]
    MissingFeature { unit: String, feature: String },
    #[error("unit {unit}: script references piece {piece} missing from model")]
    UnknownPiece { unit: String, piece: String },
    #[error("unit {unit}: bad yard map: {reason}")]
    BadYardMap { unit: String, reason: String },
    #[error("weapon {weapon}: damage table has no {DEFAULT_DAMAGE_KEY} entry")]
    MissingDefaultDamage { weapon: String },
    #[error("model {model}: piece {piece} has no parent named {parent}")]
    UnknownModelParent {
        model: String,
        piece: String,
        parent: String,
    },
    #[error("model {model}: piece {piece} participates in a parent cycle")]
    ModelParentCycle { model: String, piece: String },
}

/// All immutable game content, cross-validated.
#[derive(Default)]
pub struct GameDatabase {
    unit_definitions: FxHashMap<String, UnitDefinition>,
    weapon_definitions: FxHashMap<String, WeaponDefinition>,
    feature_definitions: FxHashMap<String, FeatureDefinition>,
    movement_class_names: FxHashMap<String, MovementClassId>,
    movement_classes: Vec<MovementClassDefinition>,
    models: FxHashMap<String, UnitModelDefinition>,
    scripts: FxHashMap<String, CobScript>,

    // Derived at finalise time.
    yard_maps: FxHashMap<String, Grid<YardMapCell>>,
    script_piece_bindings: FxHashMap<String, Vec<usize>>,
    unit_movement_classes: FxHashMap<String, MovementClassId>,
    finalised: bool,
}

impl GameDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit_definition(&mut self, def: UnitDefinition) {
        self.unit_definitions.insert(def.unit_name.clone(), def);
    }

    pub fn add_weapon_definition(&mut self, name: &str, def: WeaponDefinition) {
        self.weapon_definitions.insert(name.to_string(), def);
    }

    pub fn add_feature_definition(&mut self, name: &str, def: FeatureDefinition) {
        self.feature_definitions.insert(name.to_string(), def);
    }

    pub fn add_movement_class(&mut self, def: MovementClassDefinition) -> MovementClassId {
        if let Some(&id) = self.movement_class_names.get(&def.name) {
            self.movement_classes[id.0 as usize] = def;
            return id;
        }
        let id = MovementClassId(self.movement_classes.len() as u32);
        self.movement_class_names.insert(def.name.clone(), id);
        self.movement_classes.push(def);
        id
    }

    pub fn add_model(&mut self, name: &str, model: UnitModelDefinition) {
        self.models.insert(name.to_string(), model);
    }

    pub fn add_script(&mut self, unit_name: &str, script: CobScript) {
        self.scripts.insert(unit_name.to_string(), script);
    }

    /// Cross-validates every reference and precomputes the derived tables.
    /// Must be called once before the database is handed to a simulation.
    pub fn finalise(&mut self) -> Result<(), LoadError> {
        for (name, weapon) in &self.weapon_definitions {
            if !weapon.damage.contains_key(DEFAULT_DAMAGE_KEY) {
                return Err(LoadError::MissingDefaultDamage {
                    weapon: name.clone(),
                });
            }
        }

        let unit_names: Vec<String> = self.unit_definitions.keys().cloned().collect();
        for unit_name in unit_names {
            let def = self.unit_definitions[&unit_name].clone();

            let model =
                self.models
                    .get(&def.object_name)
                    .ok_or_else(|| LoadError::MissingModel {
                        unit: unit_name.clone(),
                        model: def.object_name.clone(),
                    })?;

            let script =
                self.scripts
                    .get(&unit_name)
                    .ok_or_else(|| LoadError::MissingScript {
                        unit: unit_name.clone(),
                    })?;

            // Bind script piece indices to model piece indices by name.
            let mut binding = Vec::with_capacity(script.piece_names.len());
            for piece in &script.piece_names {
                let index = model
                    .piece_index(piece)
                    .ok_or_else(|| LoadError::UnknownPiece {
                        unit: unit_name.clone(),
                        piece: piece.clone(),
                    })?;
                binding.push(index);
            }
            self.script_piece_bindings.insert(unit_name.clone(), binding);

            for weapon in &def.weapons {
                if !self.weapon_definitions.contains_key(weapon) {
                    return Err(LoadError::MissingWeapon {
                        unit: unit_name.clone(),
                        weapon: weapon.clone(),
                    });
                }
            }
            if let Some(explode_as) = &def.explode_as {
                if !self.weapon_definitions.contains_key(explode_as) {
                    return Err(LoadError::MissingWeapon {
                        unit: unit_name.clone(),
                        weapon: explode_as.clone(),
                    });
                }
            }

            if let Some(corpse) = &def.corpse {
                if !self.feature_definitions.contains_key(corpse) {
                    return Err(LoadError::MissingFeature {
                        unit: unit_name.clone(),
                        feature: corpse.clone(),
                    });
                }
            }

            let movement_class_id = match &def.movement_class {
                Some(class) => self.movement_class_names.get(class).copied().ok_or_else(|| {
                    LoadError::MissingMovementClass {
                        unit: unit_name.clone(),
                        class: class.clone(),
                    }
                })?,
                None => self.add_movement_class(def.ad_hoc_movement_class()),
            };
            self.unit_movement_classes
                .insert(unit_name.clone(), movement_class_id);

            if let Some(yard_map) = &def.yard_map {
                let grid = parse_yard_map(&unit_name, yard_map, def.footprint_x, def.footprint_z)?;
                self.yard_maps.insert(unit_name.clone(), grid);
            }
        }

        debug!(
            units = self.unit_definitions.len(),
            weapons = self.weapon_definitions.len(),
            movement_classes = self.movement_classes.len(),
            "game database finalised"
        );
        self.finalised = true;
        Ok(())
    }

    pub fn try_unit_definition(&self, name: &str) -> Option<&UnitDefinition> {
        self.unit_definitions.get(name)
    }

    /// Post-validation lookup; a miss here is a programmer error.
    pub fn unit_definition(&self, name: &str) -> &UnitDefinition {
        debug_assert!(self.finalised);
        self.unit_definitions
            .get(name)
            .unwrap_or_else(|| panic!("unknown unit type {name}"))
    }

    pub fn weapon_definition(&self, name: &str) -> &WeaponDefinition {
        self.weapon_definitions
            .get(name)
            .unwrap_or_else(|| panic!("unknown weapon type {name}"))
    }

    pub fn try_feature_definition(&self, name: &str) -> Option<&FeatureDefinition> {
        self.feature_definitions.get(name)
    }

    pub fn feature_definition(&self, name: &str) -> &FeatureDefinition {
        self.feature_definitions
            .get(name)
            .unwrap_or_else(|| panic!("unknown feature type {name}"))
    }

    pub fn model(&self, object_name: &str) -> &UnitModelDefinition {
        self.models
            .get(object_name)
            .unwrap_or_else(|| panic!("unknown model {object_name}"))
    }

    pub fn model_for_unit(&self, unit_name: &str) -> &UnitModelDefinition {
        self.model(&self.unit_definition(unit_name).object_name)
    }

    pub fn script(&self, unit_name: &str) -> &CobScript {
        self.scripts
            .get(unit_name)
            .unwrap_or_else(|| panic!("no script for unit type {unit_name}"))
    }

    /// Script piece index to model piece index, bound at load.
    pub fn script_piece_binding(&self, unit_name: &str) -> &[usize] {
        self.script_piece_bindings
            .get(unit_name)
            .map(Vec::as_slice)
            .unwrap_or_else(|| panic!("no piece binding for unit type {unit_name}"))
    }

    pub fn yard_map(&self, unit_name: &str) -> Option<&Grid<YardMapCell>> {
        self.yard_maps.get(unit_name)
    }

    pub fn movement_class_id(&self, unit_name: &str) -> MovementClassId {
        *self
            .unit_movement_classes
            .get(unit_name)
            .unwrap_or_else(|| panic!("unknown unit type {unit_name}"))
    }

    pub fn movement_class(&self, id: MovementClassId) -> &MovementClassDefinition {
        &self.movement_classes[id.0 as usize]
    }

    pub fn movement_classes(&self) -> impl Iterator<Item = (MovementClassId, &MovementClassDefinition)> {
        self.movement_classes
            .iter()
            .enumerate()
            .map(|(i, def)| (MovementClassId(i as u32), def))
    }
}
