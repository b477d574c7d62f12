use rayon::prelude::*;

use super::{Transform, TransformError, POSITION_COLUMNS};
use crate::pointcloud::record::PointCloudRecord;

/// Adds `shift` to every position.
///
/// `shift` must have one component per position column.
pub fn translate(
    position: &[[f64; 3]],
    shift: &[f64],
) -> Result<Vec<[f64; 3]>, TransformError> {
    let [dx, dy, dz]: [f64; POSITION_COLUMNS] =
        shift
            .try_into()
            .map_err(|_| TransformError::DimensionMismatch {
                expected: POSITION_COLUMNS,
                actual: shift.len(),
            })?;

    Ok(position
        .par_iter()
        .map(|p| [p[0] + dx, p[1] + dy, p[2] + dz])
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translate {
    pub shift: Vec<f64>,
}

impl Translate {
    pub fn new(shift: Vec<f64>) -> Self {
        Self { shift }
    }
}

impl Transform for Translate {
    fn apply(&self, record: &mut PointCloudRecord) -> Result<(), TransformError> {
        record.position = translate(&record.position, &self.shift)?;
        Ok(())
    }
}
