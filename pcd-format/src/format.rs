use std::{ffi::OsStr, fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Las,
    Laz,
    Pcd,
    Csv,
    Hdf5,
}

impl Format {
    /// Formats that have an encoder.
    pub const WRITABLE: [Format; 4] = [Format::Las, Format::Laz, Format::Pcd, Format::Csv];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "las" => Some(Self::Las),
            "laz" => Some(Self::Laz),
            "pcd" => Some(Self::Pcd),
            "csv" | "txt" => Some(Self::Csv),
            "h5" | "hdf5" => Some(Self::Hdf5),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        path.extension()
            .and_then(OsStr::to_str)
            .and_then(Self::from_extension)
            .ok_or_else(|| Error::UnsupportedFormat {
                path: path.to_path_buf(),
            })
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Las => "las",
            Self::Laz => "laz",
            Self::Pcd => "pcd",
            Self::Csv => "csv",
            Self::Hdf5 => "h5",
        }
    }

    pub fn can_encode(self) -> bool {
        !matches!(self, Self::Hdf5)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Las => "LAS",
            Self::Laz => "LAZ",
            Self::Pcd => "PCD",
            Self::Csv => "CSV",
            Self::Hdf5 => "HDF5",
        };
        f.write_str(name)
    }
}
