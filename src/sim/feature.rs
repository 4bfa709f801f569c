use crate::fixed_math::{SimAngle, SimScalar, SimVector};

/// A map feature: a tree, rock, or wreck. Mostly inert; occupies grid cells
/// when its definition blocks movement, and can be reclaimed for resources.
#[derive(Clone, Debug)]
pub struct MapFeature {
    pub feature_type: String,
    pub position: SimVector,
    pub rotation: SimAngle,
    /// Accumulated reclaim work, 0 to 1; the feature disappears at 1.
    pub reclaim_progress: SimScalar,
}

impl MapFeature {
    pub fn new(feature_type: &str, position: SimVector, rotation: SimAngle) -> Self {
        Self {
            feature_type: feature_type.to_string(),
            position,
            rotation,
            reclaim_progress: SimScalar::ZERO,
        }
    }
}
