use std::{collections::HashMap, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};

use pcd_core::{Color, PointCloudRecord};

use super::{check_encode, finish_decode, to_index, FormatAdapter, MissingFieldPolicy};
use crate::{
    error::{BoxError, Error},
    format::Format,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub missing_fields: MissingFieldPolicy,
    /// Single ASCII character separating columns.
    pub delimiter: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            missing_fields: MissingFieldPolicy::Omit,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    X,
    Y,
    Z,
    Intensity,
    GpsTime,
    Index,
    Red,
    Green,
    Blue,
    Rgb,
}

// Header spellings per column, compared after normalization.
const COLUMN_NAMES: &[(Column, &[&str])] = &[
    (Column::X, &["x"]),
    (Column::Y, &["y"]),
    (Column::Z, &["z"]),
    (Column::Intensity, &["intensity"]),
    (Column::GpsTime, &["gpstime"]),
    (Column::Index, &["index", "originalcloudindex", "pointsourceid"]),
    (Column::Red, &["red", "r"]),
    (Column::Green, &["green", "g"]),
    (Column::Blue, &["blue", "b"]),
    (Column::Rgb, &["rgb"]),
];

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(['_', '-'], "")
}

fn create_field_mapping(headers: &StringRecord) -> HashMap<Column, usize> {
    let mut mapping = HashMap::new();

    for (index, header) in headers.iter().enumerate() {
        let normalized_header = normalize_header(header);
        let column = COLUMN_NAMES
            .iter()
            .find(|(_, names)| names.contains(&normalized_header.as_str()))
            .map(|(column, _)| *column);
        if let Some(column) = column {
            mapping.entry(column).or_insert(index);
        }
    }

    mapping
}

fn delimiter_byte(delimiter: char) -> Result<u8, BoxError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("CSV delimiter {delimiter:?} is not an ASCII character").into())
}

pub struct CsvAdapter {
    pub options: CsvOptions,
}

impl CsvAdapter {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }
}

impl FormatAdapter for CsvAdapter {
    fn format(&self) -> Format {
        Format::Csv
    }

    fn decode(&self, path: &Path) -> Result<PointCloudRecord, Error> {
        let delimiter =
            delimiter_byte(self.options.delimiter).map_err(|e| Error::decode(path, e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(Trim::All)
            .from_path(path)
            .map_err(|e| Error::decode(path, e))?;

        let headers = reader.headers().map_err(|e| Error::decode(path, e))?.clone();
        let mapping = create_field_mapping(&headers);
        log::debug!("CSV columns of {:?}: {:?}", path, mapping);

        let require = |column: Column, name: &str| {
            mapping
                .get(&column)
                .copied()
                .ok_or_else(|| Error::missing_field(path, name))
        };
        let (ix, iy, iz) = (
            require(Column::X, "x")?,
            require(Column::Y, "y")?,
            require(Column::Z, "z")?,
        );

        let optional = |column: Column| mapping.get(&column).copied();
        let intensity_idx = optional(Column::Intensity);
        let gps_time_idx = optional(Column::GpsTime);
        let index_idx = optional(Column::Index);
        let split_color = [Column::Red, Column::Green, Column::Blue].map(optional);
        let packed_color_idx = optional(Column::Rgb);
        let has_split_color = split_color.iter().any(Option::is_some);
        let has_color = has_split_color || packed_color_idx.is_some();

        let mut position = Vec::new();
        let mut intensity = intensity_idx.map(|_| Vec::new());
        let mut gps_time = gps_time_idx.map(|_| Vec::new());
        let mut source_index = index_idx.map(|_| Vec::new());
        let mut color = has_color.then(Vec::new);

        for row in reader.records() {
            let row = row.map_err(|e| Error::decode(path, e))?;
            let cell = |idx: usize, name: &str| {
                parse_cell(&row, idx).map_err(|e| {
                    let line = row.position().map_or(0, |p| p.line());
                    Error::decode(path, format!("line {line}, column '{name}': {e}"))
                })
            };
            let required = |idx: usize, name: &str| {
                cell(idx, name)?.ok_or_else(|| {
                    let line = row.position().map_or(0, |p| p.line());
                    Error::decode(path, format!("line {line}: empty value for '{name}'"))
                })
            };
            let optional_cell =
                |idx: usize, name: &str| cell(idx, name).map(|v| v.unwrap_or(f64::NAN));

            position.push([required(ix, "x")?, required(iy, "y")?, required(iz, "z")?]);

            if let (Some(values), Some(idx)) = (intensity.as_mut(), intensity_idx) {
                values.push(optional_cell(idx, "intensity")? as f32);
            }
            if let (Some(values), Some(idx)) = (gps_time.as_mut(), gps_time_idx) {
                values.push(optional_cell(idx, "GpsTime")?);
            }
            if let (Some(values), Some(idx)) = (source_index.as_mut(), index_idx) {
                values.push(to_index(optional_cell(idx, "index")?));
            }
            if let Some(values) = color.as_mut() {
                let value = if has_split_color {
                    let mut channels = [0u8; 3];
                    for (channel, (idx, name)) in channels
                        .iter_mut()
                        .zip(split_color.iter().zip(["red", "green", "blue"]))
                    {
                        if let Some(idx) = idx {
                            *channel = to_channel(optional_cell(*idx, name)?);
                        }
                    }
                    Color::from(channels)
                } else {
                    let packed =
                        packed_color_idx.map_or(Ok(0.0), |idx| optional_cell(idx, "rgb"))?;
                    Color::from_pcl_u32(to_index(packed))
                };
                values.push(value);
            }
        }

        let len = position.len();
        let policy = self.options.missing_fields;
        let record = PointCloudRecord {
            position,
            intensity: policy.resolve(intensity, len),
            color: policy.resolve(color, len),
            source_index: policy.resolve(source_index, len),
            gps_time: policy.resolve(gps_time, len),
        };

        finish_decode(path, record)
    }

    fn encode(&self, record: &PointCloudRecord, path: &Path) -> Result<(), Error> {
        check_encode(record, path)?;

        let delimiter =
            delimiter_byte(self.options.delimiter).map_err(|e| Error::encode(path, e))?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(|e| Error::encode(path, e))?;

        let mut header = vec!["x", "y", "z"];
        if record.intensity.is_some() {
            header.push("intensity");
        }
        if record.gps_time.is_some() {
            header.push("GpsTime");
        }
        if record.source_index.is_some() {
            header.push("index");
        }
        if record.color.is_some() {
            header.extend(["red", "green", "blue"]);
        }
        writer
            .write_record(&header)
            .map_err(|e| Error::encode(path, e))?;

        let mut row = Vec::with_capacity(header.len());
        for i in 0..record.len() {
            row.clear();
            row.extend(record.position[i].iter().map(f64::to_string));
            if let Some(intensity) = &record.intensity {
                row.push(intensity[i].to_string());
            }
            if let Some(gps_time) = &record.gps_time {
                row.push(gps_time[i].to_string());
            }
            if let Some(source_index) = &record.source_index {
                row.push(source_index[i].to_string());
            }
            if let Some(color) = &record.color {
                let Color { r, g, b } = color[i];
                row.extend([r.to_string(), g.to_string(), b.to_string()]);
            }
            writer
                .write_record(&row)
                .map_err(|e| Error::encode(path, e))?;
        }
        writer.flush().map_err(|e| Error::encode(path, e))?;

        Ok(())
    }
}

/// `Ok(None)` for an empty or missing cell.
fn parse_cell(
    row: &StringRecord,
    idx: usize,
) -> Result<Option<f64>, std::num::ParseFloatError> {
    match row.get(idx) {
        Some(value) if !value.is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

fn to_channel(value: f64) -> u8 {
    pcd_core::pointcloud::record::finite_or_zero(value)
        .round()
        .clamp(0.0, 255.0) as u8
}
