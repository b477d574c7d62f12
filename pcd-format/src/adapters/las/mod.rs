use std::{
    fs,
    io::{Seek, Write},
    path::Path,
};

use las::{point::Format as PointFormat, Builder, Reader, Vector, Writer};
use serde::{Deserialize, Serialize};

use pcd_core::{Color, PointCloudRecord};

use super::{
    capacity_hint, check_encode, finish_decode, value_at, FormatAdapter, MissingFieldPolicy,
};
use crate::{error::Error, format::Format};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LasOptions {
    pub missing_fields: MissingFieldPolicy,
    /// LAS file version as `[major, minor]`.
    pub version: [u8; 2],
    pub point_format: u8,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
    /// Use the floored minimum of the point cloud as offset instead of `offset`.
    pub auto_offset: bool,
}

impl Default for LasOptions {
    fn default() -> Self {
        Self {
            missing_fields: MissingFieldPolicy::ZeroFill,
            version: [1, 4],
            point_format: 3,
            scale: [0.001, 0.001, 0.001],
            offset: [0.0, 0.0, 0.0],
            auto_offset: false,
        }
    }
}

/// LAS and LAZ share one adapter; `format` selects compression on write.
pub struct LasAdapter {
    pub options: LasOptions,
    format: Format,
}

impl LasAdapter {
    pub fn las(options: LasOptions) -> Self {
        Self {
            options,
            format: Format::Las,
        }
    }

    pub fn laz(options: LasOptions) -> Self {
        Self {
            options,
            format: Format::Laz,
        }
    }

    fn header(&self, record: &PointCloudRecord) -> Result<las::Header, las::Error> {
        let mut point_format = PointFormat::new(self.options.point_format)?;
        point_format.is_compressed = self.format == Format::Laz;

        let [major, minor] = self.options.version;
        let mut builder = Builder::from((major, minor));
        builder.point_format = point_format;

        let offset = match record.bounding_volume() {
            Some(bv) if self.options.auto_offset => bv.min.map(f64::floor),
            _ => self.options.offset,
        };
        let scale = self.options.scale;
        builder.transforms = Vector {
            x: las::Transform {
                scale: scale[0],
                offset: offset[0],
            },
            y: las::Transform {
                scale: scale[1],
                offset: offset[1],
            },
            z: las::Transform {
                scale: scale[2],
                offset: offset[2],
            },
        };

        builder.into_header()
    }
}

impl FormatAdapter for LasAdapter {
    fn format(&self) -> Format {
        self.format
    }

    fn decode(&self, path: &Path) -> Result<PointCloudRecord, Error> {
        let mut reader = Reader::from_path(path).map_err(|e| Error::decode(path, e))?;

        let (has_color, has_gps_time, capacity) = {
            let header = reader.header();
            let point_format = header.point_format();
            (
                point_format.has_color,
                point_format.has_gps_time,
                capacity_hint(path, header.number_of_points(), point_format.len().into()),
            )
        };

        let mut position = Vec::with_capacity(capacity);
        let mut intensity = Vec::with_capacity(capacity);
        let mut source_index = Vec::with_capacity(capacity);
        let mut color = has_color.then(|| Vec::with_capacity(capacity));
        let mut gps_time = has_gps_time.then(|| Vec::with_capacity(capacity));

        for las_point in reader.points() {
            let las_point = las_point.map_err(|e| Error::decode(path, e))?;

            position.push([las_point.x, las_point.y, las_point.z]);
            intensity.push(las_point.intensity as f32);
            source_index.push(las_point.point_source_id as u32);
            if let Some(color) = color.as_mut() {
                color.push(
                    las_point
                        .color
                        .map(|c| Color::from_rgb16(c.red, c.green, c.blue))
                        .unwrap_or_default(),
                );
            }
            if let Some(gps_time) = gps_time.as_mut() {
                gps_time.push(las_point.gps_time.unwrap_or(0.0));
            }
        }

        let len = position.len();
        let policy = self.options.missing_fields;
        let record = PointCloudRecord {
            position,
            intensity: Some(intensity),
            color: policy.resolve(color, len),
            source_index: Some(source_index),
            gps_time: policy.resolve(gps_time, len),
        };

        finish_decode(path, record)
    }

    fn encode(&self, record: &PointCloudRecord, path: &Path) -> Result<(), Error> {
        check_encode(record, path)?;

        let header = self.header(record).map_err(|e| Error::encode(path, e))?;
        let point_format = header.point_format().clone();
        if point_format.has_waveform {
            return Err(Error::encode(
                path,
                format!(
                    "point format {} carries waveforms, which are not written",
                    self.options.point_format
                ),
            ));
        }
        if record.color.is_some() && !point_format.has_color {
            log::warn!(
                "point format {} has no color, colors are dropped for {:?}",
                self.options.point_format,
                path
            );
        }
        if record.gps_time.is_some() && !point_format.has_gps_time {
            log::warn!(
                "point format {} has no GPS time, timestamps are dropped for {:?}",
                self.options.point_format,
                path
            );
        }

        check_coordinates(&header, record).map_err(|e| Error::encode(path, e))?;

        let mut writer =
            Writer::from_path(path, header).map_err(|e| Error::encode(path, e))?;
        let written = write_points(&mut writer, record, &point_format).and_then(|clamped| {
            writer.close()?;
            Ok(clamped)
        });
        let clamped = match written {
            Ok(clamped) => clamped,
            Err(e) => {
                // An unclosed writer panics on drop.
                if writer.close().is_err() {
                    std::mem::forget(writer);
                }
                if let Err(remove_error) = fs::remove_file(path) {
                    log::warn!(
                        "could not remove partial output {:?}: {}",
                        path,
                        remove_error
                    );
                }
                return Err(Error::encode(path, e));
            }
        };

        if clamped > 0 {
            log::warn!(
                "{} points had intensity or source index outside the 16-bit range of {:?}",
                clamped,
                path
            );
        }

        Ok(())
    }
}

/// Fails on the first coordinate that the header's scale and offset cannot
/// store as a 32-bit integer.
fn check_coordinates(header: &las::Header, record: &PointCloudRecord) -> Result<(), String> {
    let transforms = header.transforms();
    let axes = [("x", &transforms.x), ("y", &transforms.y), ("z", &transforms.z)];

    for (i, p) in record.position.iter().enumerate() {
        for ((axis, transform), value) in axes.iter().zip(p) {
            if transform.inverse(*value).is_err() {
                return Err(format!(
                    "point {i}: {axis} = {value} is out of range for scale {} and offset {}, \
                     set `las.offset` near the data or enable `las.auto_offset`",
                    transform.scale, transform.offset
                ));
            }
        }
    }

    Ok(())
}

/// Writes every point and returns how many had a clamped attribute.
fn write_points<W>(
    writer: &mut Writer<W>,
    record: &PointCloudRecord,
    point_format: &PointFormat,
) -> Result<usize, las::Error>
where
    W: 'static + Seek + Write + Send + Sync,
{
    let mut clamped = 0usize;
    for i in 0..record.len() {
        let [x, y, z] = record.position[i];

        let (intensity, intensity_clamped) =
            clamp_u16(value_at(record.intensity.as_ref(), i) as f64);
        let (point_source_id, index_clamped) =
            clamp_u16(value_at(record.source_index.as_ref(), i) as f64);
        clamped += (intensity_clamped || index_clamped) as usize;

        let las_point = las::Point {
            x,
            y,
            z,
            intensity,
            point_source_id,
            gps_time: point_format
                .has_gps_time
                .then(|| value_at(record.gps_time.as_ref(), i)),
            color: point_format.has_color.then(|| {
                let [r, g, b] = value_at(record.color.as_ref(), i).to_rgb16();
                las::Color::new(r, g, b)
            }),
            nir: point_format.has_nir.then_some(0),
            ..Default::default()
        };
        writer.write_point(las_point)?;
    }
    Ok(clamped)
}

fn clamp_u16(value: f64) -> (u16, bool) {
    let rounded = value.round();
    let clamped = rounded.clamp(0.0, u16::MAX as f64);
    (clamped as u16, clamped != rounded)
}
