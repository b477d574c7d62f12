use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use pcd_core::{CompositeTransform, RotateXY, Translate};

use crate::{
    adapters::{
        csv::{CsvAdapter, CsvOptions},
        hdf5::{Hdf5Adapter, Hdf5Options},
        las::{LasAdapter, LasOptions},
        pcd::{PcdAdapter, PcdOptions},
        FormatAdapter,
    },
    error::{BoxError, Error},
    format::Format,
};

/// Settings for every adapter plus the transforms applied between decode
/// and encode. Every field has a default, so a partial JSON document is
/// enough.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub las: LasOptions,
    pub pcd: PcdOptions,
    pub csv: CsvOptions,
    pub hdf5: Hdf5Options,
    /// Added to every position before rotation.
    pub shift: Option<Vec<f64>>,
    /// Rotation of the X/Y plane in radians.
    pub rotate_xy: Option<f64>,
}

impl ConvertOptions {
    pub fn from_json_path(path: &Path) -> Result<Self, Error> {
        let options_error = |e: BoxError| Error::Options {
            path: path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).map_err(|e| options_error(e.into()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| options_error(e.into()))
    }

    pub fn adapter(&self, format: Format) -> Box<dyn FormatAdapter> {
        match format {
            Format::Las => Box::new(LasAdapter::las(self.las.clone())),
            Format::Laz => Box::new(LasAdapter::laz(self.las.clone())),
            Format::Pcd => Box::new(PcdAdapter::new(self.pcd.clone())),
            Format::Csv => Box::new(CsvAdapter::new(self.csv.clone())),
            Format::Hdf5 => Box::new(Hdf5Adapter::new(self.hdf5.clone())),
        }
    }

    pub fn transform(&self) -> CompositeTransform {
        let mut transform = CompositeTransform::default();
        if let Some(shift) = &self.shift {
            transform.push(Box::new(Translate::new(shift.clone())));
        }
        if let Some(angle) = self.rotate_xy {
            transform.push(Box::new(RotateXY::new(angle)));
        }
        transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::pcd::ColorPacking, MissingFieldPolicy};

    #[test]
    fn partial_json_keeps_defaults() {
        let options: ConvertOptions = serde_json::from_str(
            r#"{
                "las": { "scale": [0.01, 0.01, 0.01] },
                "pcd": { "color_packing": "legacy_fraction" },
                "shift": [200.0, 100.0, 50.0]
            }"#,
        )
        .unwrap();

        assert_eq!(options.las.scale, [0.01, 0.01, 0.01]);
        assert_eq!(options.las.point_format, 3);
        assert_eq!(options.las.missing_fields, MissingFieldPolicy::ZeroFill);
        assert_eq!(options.pcd.color_packing, ColorPacking::LegacyFraction);
        assert_eq!(options.pcd.missing_fields, MissingFieldPolicy::Omit);
        assert_eq!(options.hdf5.dataset, "dataset_a");
        assert_eq!(options.rotate_xy, None);
        assert!(!options.transform().is_empty());
    }

    #[test]
    fn adapters_match_requested_format() {
        let options = ConvertOptions::default();
        for format in [Format::Las, Format::Laz, Format::Pcd, Format::Csv, Format::Hdf5] {
            assert_eq!(options.adapter(format).format(), format);
        }
        assert!(options.transform().is_empty());
    }

    #[test]
    fn missing_options_file_reports_its_path() {
        let path = Path::new("/nonexistent/options.json");
        match ConvertOptions::from_json_path(path) {
            Err(err @ Error::Options { .. }) => assert_eq!(err.path(), path),
            other => panic!("expected an options error, got {other:?}"),
        }
    }
}
