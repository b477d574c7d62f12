use std::{fs, path::Path};

use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use pcd_core::{transform::rotate_xy, Color, PointCloudRecord};
use pcd_format::{ConvertOptions, Format, FormatAdapter as _};

fn full_record() -> PointCloudRecord {
    PointCloudRecord {
        position: vec![
            [0.0, 0.0, 0.0],
            [1.25, -2.5, 3.125],
            [100.001, 200.002, -0.5],
            [-7.75, 12.0, 42.042],
        ],
        intensity: Some(vec![0.0, 10.0, 255.0, 4096.0]),
        color: Some(vec![
            Color::new(0, 0, 0),
            Color::new(255, 128, 1),
            Color::new(12, 34, 56),
            Color::new(255, 255, 255),
        ]),
        source_index: Some(vec![0, 1, 2, 7]),
        gps_time: Some(vec![0.0, 1.5, 2.25, 1024.5]),
    }
}

fn assert_positions_close(actual: &[[f64; 3]], expected: &[[f64; 3]], epsilon: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        for axis in 0..3 {
            assert_abs_diff_eq!(a[axis], e[axis], epsilon = epsilon);
        }
    }
}

fn round_trip(
    format: Format,
    options: &ConvertOptions,
    record: &PointCloudRecord,
) -> PointCloudRecord {
    let dir = tempdir().unwrap();
    let path = dir.path().join(format!("cloud.{}", format.extension()));
    let adapter = options.adapter(format);

    adapter.encode(record, &path).unwrap();
    adapter.decode(&path).unwrap()
}

#[test]
fn las_family_round_trip_is_exact_for_integer_attributes() {
    let record = full_record();
    let options = ConvertOptions::default();

    for format in [Format::Las, Format::Laz] {
        let decoded = round_trip(format, &options, &record);

        assert_positions_close(&decoded.position, &record.position, 1e-3);
        assert_eq!(decoded.intensity, record.intensity);
        assert_eq!(decoded.source_index, record.source_index);
        assert_eq!(decoded.color, record.color);
        assert_eq!(decoded.gps_time, record.gps_time);
    }
}

#[test]
fn pcd_round_trip_keeps_attributes_within_float_precision() {
    let record = full_record();
    let decoded = round_trip(Format::Pcd, &ConvertOptions::default(), &record);

    assert_positions_close(&decoded.position, &record.position, 1e-3);
    assert_eq!(decoded.color, record.color);
    assert_eq!(decoded.source_index, record.source_index);

    let intensity = decoded.intensity.unwrap();
    for (a, e) in intensity.iter().zip(record.intensity.unwrap()) {
        assert_abs_diff_eq!(*a, e, epsilon = 1e-3);
    }
    let gps_time = decoded.gps_time.unwrap();
    for (a, e) in gps_time.iter().zip(record.gps_time.unwrap()) {
        assert_abs_diff_eq!(*a, e, epsilon = 1e-3);
    }
}

#[test]
fn pcd_ascii_round_trip_keeps_packed_color_bits() {
    let mut options = ConvertOptions::default();
    options.pcd.data = pcd_format::adapters::pcd::PcdData::Ascii;

    let record = full_record();
    let decoded = round_trip(Format::Pcd, &options, &record);

    assert_positions_close(&decoded.position, &record.position, 1e-3);
    assert_eq!(decoded.color, record.color);
}

#[test]
fn pcd_legacy_color_packing_is_approximate_but_deterministic() {
    let mut options = ConvertOptions::default();
    options.pcd.color_packing = pcd_format::adapters::pcd::ColorPacking::LegacyFraction;

    let record = full_record();
    let decoded = round_trip(Format::Pcd, &options, &record);

    let expected: Vec<Color> = record
        .color
        .unwrap()
        .iter()
        .map(|c| Color::from_legacy_fraction(c.to_legacy_fraction()))
        .collect();
    assert_eq!(decoded.color, Some(expected));
}

#[test]
fn csv_round_trip_is_exact() {
    let record = full_record();
    let decoded = round_trip(Format::Csv, &ConvertOptions::default(), &record);
    assert_eq!(decoded, record);
}

#[test]
fn csv_round_trip_keeps_absent_attributes_absent() {
    let record = PointCloudRecord::new(vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let decoded = round_trip(Format::Csv, &ConvertOptions::default(), &record);
    assert_eq!(decoded, record);
}

#[test]
fn las_rotation_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("three.las");
    let options = ConvertOptions::default();
    let adapter = options.adapter(Format::Las);

    let mut record =
        PointCloudRecord::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    record.intensity = Some(vec![10.0, 20.0, 30.0]);
    adapter.encode(&record, &path).unwrap();

    let decoded = adapter.decode(&path).unwrap();
    let rotated = rotate_xy(&decoded.position, std::f64::consts::PI);

    assert_positions_close(
        &rotated,
        &[[0.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]],
        1e-6,
    );
    assert_eq!(decoded.intensity, Some(vec![10.0, 20.0, 30.0]));
}

#[test]
fn pcd_output_always_declares_seven_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sparse.pcd");
    let options = ConvertOptions::default();
    let adapter = options.adapter(Format::Pcd);

    let record = PointCloudRecord::new((0..5).map(|i| [i as f64, 0.0, 1.0]).collect());
    adapter.encode(&record, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    let header_end = bytes
        .windows(5)
        .position(|w| w == b"DATA ")
        .expect("PCD header has a DATA line");
    let header = String::from_utf8_lossy(&bytes[..header_end]);
    let line = |key: &str| {
        header
            .lines()
            .find(|l| l.starts_with(key))
            .map(|l| l.split_whitespace().skip(1).collect::<Vec<_>>())
            .unwrap_or_default()
    };
    assert_eq!(
        line("FIELDS"),
        ["x", "y", "z", "rgb", "GpsTime", "Original_cloud_index", "Intensity"]
    );
    assert_eq!(line("TYPE"), ["F"; 7]);
    assert_eq!(line("SIZE"), ["4"; 7]);
    assert_eq!(line("WIDTH"), ["5"]);
    assert_eq!(line("HEIGHT"), ["1"]);

    let decoded = adapter.decode(&path).unwrap();
    assert_eq!(decoded.intensity, Some(vec![0.0; 5]));
    assert_eq!(decoded.gps_time, Some(vec![0.0; 5]));
    assert_eq!(decoded.source_index, Some(vec![0; 5]));
    assert_eq!(decoded.color, Some(vec![Color::default(); 5]));
}

#[test]
fn encoding_an_invalid_record_creates_no_file() {
    let dir = tempdir().unwrap();
    let options = ConvertOptions::default();

    let mut record = PointCloudRecord::new(vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
    record.intensity = Some(vec![1.0]);

    for format in Format::WRITABLE {
        let path = dir.path().join(format!("bad.{}", format.extension()));
        let err = options.adapter(format).encode(&record, &path).unwrap_err();
        assert!(matches!(err, pcd_format::Error::InvalidRecord { .. }));
        assert!(!path.exists());
    }

    let path = dir.path().join("empty.csv");
    let err = options
        .adapter(Format::Csv)
        .encode(&PointCloudRecord::default(), &path)
        .unwrap_err();
    assert!(matches!(
        err,
        pcd_format::Error::InvalidRecord {
            source: pcd_core::RecordError::EmptyCloud,
            ..
        }
    ));
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

#[test]
fn csv_conversion_with_transform_options() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    write(&input, "x,y,z,intensity\n1,0,5,3\n0,2,6,4\n");

    let options: ConvertOptions = serde_json::from_str(
        r#"{ "shift": [1.0, 0.0, 10.0], "rotate_xy": 1.5707963267948966 }"#,
    )
    .unwrap();
    pcd_format::convert_file(&input, &output, &options).unwrap();

    let decoded = ConvertOptions::default()
        .adapter(Format::Csv)
        .decode(&output)
        .unwrap();
    assert_positions_close(&decoded.position, &[[0.0, 2.0, 15.0], [-2.0, 1.0, 16.0]], 1e-9);
    assert_eq!(decoded.intensity, Some(vec![3.0, 4.0]));
}
