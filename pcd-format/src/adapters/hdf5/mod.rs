use std::path::Path;

use serde::{Deserialize, Serialize};

use pcd_core::PointCloudRecord;

use super::{FormatAdapter, MissingFieldPolicy};
use crate::{error::Error, format::Format};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hdf5Options {
    pub missing_fields: MissingFieldPolicy,
    /// Dataset holding the coordinates.
    pub dataset: String,
    /// Slab read from a three-dimensional `[clouds, points, columns]` dataset.
    pub index: usize,
}

impl Default for Hdf5Options {
    fn default() -> Self {
        Self {
            missing_fields: MissingFieldPolicy::Omit,
            dataset: "dataset_a".to_string(),
            index: 5,
        }
    }
}

/// Reads positions out of an HDF5 dataset. There is no HDF5 writer.
pub struct Hdf5Adapter {
    pub options: Hdf5Options,
}

impl Hdf5Adapter {
    pub fn new(options: Hdf5Options) -> Self {
        Self { options }
    }

    #[cfg(feature = "hdf5")]
    fn read_positions(&self, path: &Path) -> Result<Vec<[f64; 3]>, Error> {
        let file = hdf5::File::open(path).map_err(|e| Error::decode(path, e))?;
        let dataset = file
            .dataset(&self.options.dataset)
            .map_err(|_| Error::missing_field(path, self.options.dataset.as_str()))?;
        let data = dataset
            .read_dyn::<f64>()
            .map_err(|e| Error::decode(path, e))?;

        let shape = data.shape().to_vec();
        let values: Vec<f64> = data.iter().copied().collect();
        slab_positions(&values, &shape, self.options.index)
            .map_err(|e| Error::decode(path, e))
    }

    #[cfg(not(feature = "hdf5"))]
    fn read_positions(&self, path: &Path) -> Result<Vec<[f64; 3]>, Error> {
        Err(Error::UnsupportedOperation {
            path: path.to_path_buf(),
            format: Format::Hdf5,
            operation: "decoding without the `hdf5` feature",
        })
    }
}

impl FormatAdapter for Hdf5Adapter {
    fn format(&self) -> Format {
        Format::Hdf5
    }

    fn decode(&self, path: &Path) -> Result<PointCloudRecord, Error> {
        let position = self.read_positions(path)?;

        let len = position.len();
        let policy = self.options.missing_fields;
        let record = PointCloudRecord {
            position,
            intensity: policy.resolve(None, len),
            color: policy.resolve(None, len),
            source_index: policy.resolve(None, len),
            gps_time: policy.resolve(None, len),
        };

        super::finish_decode(path, record)
    }

    fn encode(&self, _record: &PointCloudRecord, path: &Path) -> Result<(), Error> {
        Err(Error::UnsupportedOperation {
            path: path.to_path_buf(),
            format: Format::Hdf5,
            operation: "encoding",
        })
    }
}

/// Positions from a row-major dataset.
///
/// `[points, columns]` is used as is; `[clouds, points, columns]` is reduced
/// to the slab at `index`. The first three columns are x, y, z and missing
/// columns read as zero.
#[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
fn slab_positions(
    values: &[f64],
    shape: &[usize],
    index: usize,
) -> Result<Vec<[f64; 3]>, String> {
    let (offset, points, columns) = match *shape {
        [points, columns] => (0, points, columns),
        [clouds, points, columns] => {
            if index >= clouds {
                return Err(format!(
                    "slab {index} requested but the dataset holds {clouds}"
                ));
            }
            (index * points * columns, points, columns)
        }
        _ => return Err(format!("expected a 2-D or 3-D dataset, got shape {shape:?}")),
    };
    if columns == 0 {
        return Err("dataset has no coordinate columns".to_string());
    }
    if columns < 3 {
        log::debug!("dataset has {columns} coordinate columns, padding to 3 with zeros");
    }

    let slab = &values[offset..offset + points * columns];
    Ok(slab
        .chunks_exact(columns)
        .map(|row| {
            let mut p = [0.0; 3];
            for (dst, src) in p.iter_mut().zip(row) {
                *dst = *src;
            }
            p
        })
        .collect())
}
