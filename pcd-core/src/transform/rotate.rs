use rayon::prelude::*;

use super::{Transform, TransformError};
use crate::pointcloud::record::PointCloudRecord;

/// Rotates every point about the Z axis by `angle` radians. Z is unchanged.
pub fn rotate_xy(position: &[[f64; 3]], angle: f64) -> Vec<[f64; 3]> {
    let (sin, cos) = angle.sin_cos();
    position
        .par_iter()
        .map(|p| [cos * p[0] - sin * p[1], sin * p[0] + cos * p[1], p[2]])
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateXY {
    pub angle: f64,
}

impl RotateXY {
    pub fn new(angle: f64) -> Self {
        Self { angle }
    }
}

impl Transform for RotateXY {
    fn apply(&self, record: &mut PointCloudRecord) -> Result<(), TransformError> {
        record.position = rotate_xy(&record.position, self.angle);
        Ok(())
    }
}
