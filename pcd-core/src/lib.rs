pub mod pointcloud;
pub mod transform;

pub use pointcloud::{
    color::Color,
    record::{BoundingVolume, PointCloudRecord, RecordError},
};
pub use transform::{CompositeTransform, RotateXY, Transform, TransformError, Translate};
