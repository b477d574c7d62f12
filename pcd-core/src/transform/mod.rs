use crate::pointcloud::record::PointCloudRecord;

pub mod rotate;
pub mod translate;

pub use rotate::{rotate_xy, RotateXY};
pub use translate::{translate, Translate};

/// Number of coordinate columns carried by `PointCloudRecord::position`.
pub const POSITION_COLUMNS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("shift has {actual} components but positions have {expected} columns")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A geometric operation on the positions of a record.
///
/// Implementations replace `record.position` and leave every other
/// attribute untouched. On error the record is unchanged.
pub trait Transform: Send + Sync {
    fn apply(&self, record: &mut PointCloudRecord) -> Result<(), TransformError>;
}

#[derive(Default)]
pub struct CompositeTransform {
    transforms: Vec<Box<dyn Transform>>,
}

impl CompositeTransform {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for CompositeTransform {
    fn apply(&self, record: &mut PointCloudRecord) -> Result<(), TransformError> {
        // On failure the record keeps its original positions.
        let mut position = record.position.clone();
        for transform in &self.transforms {
            let mut stage = PointCloudRecord::new(position);
            transform.apply(&mut stage)?;
            position = stage.position;
        }
        record.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn composite_applies_stages_in_order() {
        let mut record = PointCloudRecord::new(vec![[1.0, 0.0, 2.0]]);
        record.intensity = Some(vec![42.0]);

        let composite = CompositeTransform::new(vec![
            Box::new(Translate::new(vec![1.0, 0.0, 0.0])),
            Box::new(RotateXY::new(FRAC_PI_2)),
        ]);
        composite.apply(&mut record).unwrap();

        assert_abs_diff_eq!(record.position[0][0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(record.position[0][1], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(record.position[0][2], 2.0, epsilon = 1e-9);
        assert_eq!(record.intensity, Some(vec![42.0]));
    }

    #[test]
    fn failing_stage_leaves_record_untouched() {
        let original = PointCloudRecord::new(vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mut record = original.clone();

        let composite = CompositeTransform::new(vec![
            Box::new(Translate::new(vec![10.0, 10.0, 10.0])),
            Box::new(Translate::new(vec![1.0, 1.0])),
        ]);
        let err = composite.apply(&mut record).unwrap_err();

        assert_eq!(
            err,
            TransformError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(record, original);
    }

    #[test]
    fn empty_composite_is_identity() {
        let mut record = PointCloudRecord::new(vec![[1.0, 2.0, 3.0]]);
        let composite = CompositeTransform::default();
        assert!(composite.is_empty());
        composite.apply(&mut record).unwrap();
        assert_eq!(record.position, vec![[1.0, 2.0, 3.0]]);
    }
}
