use std::path::Path;

use pcd_rs::{DataKind, DynReader, DynRecord, Field, Schema, ValueKind, Writer, WriterInit};
use serde::{Deserialize, Serialize};

use pcd_core::{Color, PointCloudRecord};

use super::{
    capacity_hint, check_encode, finish_decode, to_index, value_at, FormatAdapter,
    MissingFieldPolicy,
};
use crate::{error::Error, format::Format};

/// Fields of every written PCD file, in order. All are F32 with count 1.
pub const PCD_FIELDS: [&str; 7] = [
    "x",
    "y",
    "z",
    "rgb",
    "GpsTime",
    "Original_cloud_index",
    "Intensity",
];

const INTENSITY_FIELDS: &[&str] = &["Intensity", "intensity"];
const COLOR_FIELDS: &[&str] = &["rgb", "rgba"];
const GPS_TIME_FIELDS: &[&str] = &["GpsTime"];
const SOURCE_INDEX_FIELDS: &[&str] = &["Original_cloud_index", "point_source_id", "index"];

/// How three color channels share the single `rgb` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPacking {
    /// `0x00RRGGBB` stored as the bit pattern of a float, as PCL does.
    #[default]
    Pcl,
    /// Sum of the three 16-bit channel fractions. Decoding is approximate.
    LegacyFraction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcdData {
    Ascii,
    #[default]
    Binary,
}

impl From<PcdData> for DataKind {
    fn from(data: PcdData) -> Self {
        match data {
            PcdData::Ascii => DataKind::Ascii,
            PcdData::Binary => DataKind::Binary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcdOptions {
    pub missing_fields: MissingFieldPolicy,
    pub color_packing: ColorPacking,
    pub data: PcdData,
}

pub struct PcdAdapter {
    pub options: PcdOptions,
}

impl PcdAdapter {
    pub fn new(options: PcdOptions) -> Self {
        Self { options }
    }

    fn unpack_color(&self, field: &Field) -> Color {
        let color = match (field, self.options.color_packing) {
            (Field::U32(v), _) => v.first().map(|&packed| Color::from_pcl_u32(packed)),
            (Field::I32(v), _) => v.first().map(|&packed| Color::from_pcl_u32(packed as u32)),
            (Field::F32(v), ColorPacking::Pcl) => {
                v.first().map(|&packed| Color::from_pcl_packed(packed))
            }
            (field, ColorPacking::Pcl) => {
                scalar(field).map(|packed| Color::from_pcl_u32(packed as u32))
            }
            (field, ColorPacking::LegacyFraction) => {
                scalar(field).map(|packed| Color::from_legacy_fraction(packed as f32))
            }
        };
        color.unwrap_or_default()
    }

    fn pack_color(&self, color: Color) -> f32 {
        match self.options.color_packing {
            ColorPacking::Pcl => color.to_pcl_packed(),
            ColorPacking::LegacyFraction => color.to_legacy_fraction(),
        }
    }
}

impl FormatAdapter for PcdAdapter {
    fn format(&self) -> Format {
        Format::Pcd
    }

    fn decode(&self, path: &Path) -> Result<PointCloudRecord, Error> {
        let reader = DynReader::open(path).map_err(|e| Error::decode(path, e))?;

        let meta = reader.meta();
        let names: Vec<String> = meta
            .field_defs
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        let point_size = meta
            .field_defs
            .fields
            .iter()
            .map(|field| value_size(field.kind).saturating_mul(field.count))
            .fold(0u64, u64::saturating_add);
        let capacity = capacity_hint(path, meta.num_points, point_size);
        log::debug!("PCD fields of {:?}: {:?}", path, names);

        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|name| names.iter().position(|field| field == name))
        };
        let require =
            |name: &str| find(&[name]).ok_or_else(|| Error::missing_field(path, name));

        let (ix, iy, iz) = (require("x")?, require("y")?, require("z")?);
        let intensity_idx = find(INTENSITY_FIELDS);
        let color_idx = find(COLOR_FIELDS);
        let gps_time_idx = find(GPS_TIME_FIELDS);
        let source_index_idx = find(SOURCE_INDEX_FIELDS);

        let mut position = Vec::with_capacity(capacity);
        let mut intensity = intensity_idx.map(|_| Vec::with_capacity(capacity));
        let mut color = color_idx.map(|_| Vec::with_capacity(capacity));
        let mut gps_time = gps_time_idx.map(|_| Vec::with_capacity(capacity));
        let mut source_index = source_index_idx.map(|_| Vec::with_capacity(capacity));

        for pcd_record in reader {
            let DynRecord(fields) = pcd_record.map_err(|e| Error::decode(path, e))?;
            let value = |idx: usize| scalar(&fields[idx]).unwrap_or(f64::NAN);

            position.push([value(ix), value(iy), value(iz)]);
            if let (Some(values), Some(idx)) = (intensity.as_mut(), intensity_idx) {
                values.push(value(idx) as f32);
            }
            if let (Some(values), Some(idx)) = (color.as_mut(), color_idx) {
                values.push(self.unpack_color(&fields[idx]));
            }
            if let (Some(values), Some(idx)) = (gps_time.as_mut(), gps_time_idx) {
                values.push(value(idx));
            }
            if let (Some(values), Some(idx)) = (source_index.as_mut(), source_index_idx) {
                values.push(to_index(value(idx)));
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

        let schema =
            Schema::from_iter(PCD_FIELDS.iter().map(|&name| (name, ValueKind::F32, 1)));
        let mut writer: Writer<DynRecord, _> = WriterInit {
            width: record.len() as u64,
            height: 1,
            viewpoint: Default::default(),
            data_kind: self.options.data.into(),
            schema: Some(schema),
        }
        .create(path)
        .map_err(|e| Error::encode(path, e))?;

        for i in 0..record.len() {
            let [x, y, z] = record.position[i];
            let rgb = record
                .color
                .as_ref()
                .map_or(0.0, |colors| self.pack_color(colors[i]));
            let pcd_record = DynRecord(vec![
                Field::F32(vec![x as f32]),
                Field::F32(vec![y as f32]),
                Field::F32(vec![z as f32]),
                Field::F32(vec![rgb]),
                Field::F32(vec![value_at(record.gps_time.as_ref(), i) as f32]),
                Field::F32(vec![value_at(record.source_index.as_ref(), i) as f32]),
                Field::F32(vec![value_at(record.intensity.as_ref(), i)]),
            ]);
            writer
                .push(&pcd_record)
                .map_err(|e| Error::encode(path, e))?;
        }
        writer.finish().map_err(|e| Error::encode(path, e))?;

        Ok(())
    }
}

/// Bytes taken by one binary value of `kind`.
fn value_size(kind: ValueKind) -> u64 {
    match kind {
        ValueKind::U8 | ValueKind::I8 => 1,
        ValueKind::U16 | ValueKind::I16 => 2,
        ValueKind::U32 | ValueKind::I32 | ValueKind::F32 => 4,
        ValueKind::F64 => 8,
    }
}

/// First element of a PCD field as `f64`, whatever its declared type.
fn scalar(field: &Field) -> Option<f64> {
    match field {
        Field::I8(v) => v.first().map(|&x| x as f64),
        Field::I16(v) => v.first().map(|&x| x as f64),
        Field::I32(v) => v.first().map(|&x| x as f64),
        Field::U8(v) => v.first().map(|&x| x as f64),
        Field::U16(v) => v.first().map(|&x| x as f64),
        Field::U32(v) => v.first().map(|&x| x as f64),
        Field::F32(v) => v.first().map(|&x| x as f64),
        Field::F64(v) => v.first().copied(),
    }
}
