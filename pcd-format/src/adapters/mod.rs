use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use pcd_core::PointCloudRecord;

use crate::{error::Error, format::Format};

pub mod csv;
pub mod hdf5;
pub mod las;
pub mod pcd;

/// Translates between one on-disk format and [`PointCloudRecord`].
///
/// Adapters hold only their options; every call opens, reads or writes,
/// and closes its own file.
pub trait FormatAdapter: Send + Sync {
    fn format(&self) -> Format;

    fn decode(&self, path: &Path) -> Result<PointCloudRecord, Error>;

    fn encode(&self, record: &PointCloudRecord, path: &Path) -> Result<(), Error>;
}

/// What a decoder does with an optional attribute the source file lacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// The attribute stays `None`.
    #[default]
    Omit,
    /// The attribute is filled with one zero per point.
    ZeroFill,
}

impl MissingFieldPolicy {
    pub fn resolve<T: Default + Clone>(
        self,
        values: Option<Vec<T>>,
        len: usize,
    ) -> Option<Vec<T>> {
        match (values, self) {
            (Some(values), _) => Some(values),
            (None, Self::Omit) => None,
            (None, Self::ZeroFill) => Some(vec![T::default(); len]),
        }
    }
}

pub(crate) fn finish_decode(
    path: &Path,
    mut record: PointCloudRecord,
) -> Result<PointCloudRecord, Error> {
    record.coerce_nan();
    record.validate().map_err(|source| Error::InvalidRecord {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!(
        "decoded {} points from {:?} (intensity: {}, color: {}, source index: {}, gps time: {})",
        record.len(),
        path,
        record.intensity.is_some(),
        record.color.is_some(),
        record.source_index.is_some(),
        record.gps_time.is_some(),
    );

    Ok(record)
}

pub(crate) fn check_encode(record: &PointCloudRecord, path: &Path) -> Result<(), Error> {
    record.validate().map_err(|source| Error::InvalidRecord {
        path: path.to_path_buf(),
        source,
    })
}

/// Points worth preallocating for a file whose header declares `declared`
/// points of at least `point_size` bytes each. The count is capped by what
/// the file can actually hold.
pub(crate) fn capacity_hint(path: &Path, declared: u64, point_size: u64) -> usize {
    let file_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let fits = file_len / point_size.max(1);
    usize::try_from(declared.min(fits)).unwrap_or(0)
}

#[inline]
pub(crate) fn value_at<T: Copy + Default>(values: Option<&Vec<T>>, index: usize) -> T {
    values.map_or_else(T::default, |v| v[index])
}

/// Float to point source index. NaN and negatives become 0.
#[inline]
pub(crate) fn to_index(value: f64) -> u32 {
    pcd_core::pointcloud::record::finite_or_zero(value).round() as u32
}
