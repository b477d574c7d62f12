use serde::{Deserialize, Serialize};

use super::color::Color;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("point cloud has no points")]
    EmptyCloud,

    #[error("attribute '{attribute}' has {actual} values but the cloud has {expected} points")]
    ShapeMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Format-independent point cloud used as the pivot between every adapter.
///
/// Optional attributes are `None` when the source did not carry them. When
/// present, each holds exactly one value per entry of `position`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloudRecord {
    pub position: Vec<[f64; 3]>,
    pub intensity: Option<Vec<f32>>,
    pub color: Option<Vec<Color>>,
    pub source_index: Option<Vec<u32>>,
    pub gps_time: Option<Vec<f64>>,
}

impl PointCloudRecord {
    pub fn new(position: Vec<[f64; 3]>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.position.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        let expected = self.len();
        if expected == 0 {
            return Err(RecordError::EmptyCloud);
        }

        let lengths = [
            ("intensity", self.intensity.as_ref().map(Vec::len)),
            ("color", self.color.as_ref().map(Vec::len)),
            ("source_index", self.source_index.as_ref().map(Vec::len)),
            ("gps_time", self.gps_time.as_ref().map(Vec::len)),
        ];
        for (attribute, actual) in lengths {
            if let Some(actual) = actual {
                if actual != expected {
                    return Err(RecordError::ShapeMismatch {
                        attribute,
                        expected,
                        actual,
                    });
                }
            }
        }

        Ok(())
    }

    /// Replaces NaN in the floating-point attributes with zero.
    ///
    /// Decoders call this once the record is assembled so that every
    /// attribute stays numeric. Positions are left as decoded.
    pub fn coerce_nan(&mut self) {
        if let Some(intensity) = self.intensity.as_mut() {
            intensity.iter_mut().for_each(|v| *v = finite_or_zero_f32(*v));
        }
        if let Some(gps_time) = self.gps_time.as_mut() {
            gps_time.iter_mut().for_each(|v| *v = finite_or_zero(*v));
        }
    }

    pub fn bounding_volume(&self) -> Option<BoundingVolume> {
        if self.position.is_empty() {
            return None;
        }

        let mut bounding_volume = BoundingVolume {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        };
        for p in &self.position {
            for axis in 0..3 {
                bounding_volume.min[axis] = bounding_volume.min[axis].min(p[axis]);
                bounding_volume.max[axis] = bounding_volume.max[axis].max(p[axis]);
            }
        }

        Some(bounding_volume)
    }
}

/// Per-axis minimum and maximum of a set of positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// NaN becomes 0.0; every other value passes through.
#[inline]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[inline]
pub fn finite_or_zero_f32(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
