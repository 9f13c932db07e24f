//! EXIF metadata extraction.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use exif::{Exif, In, Rational, Tag, Value};
use survey_core::LocalPhoto;

/// Exposure time assumed when a photo does not record one.
pub const DEFAULT_EXPOSURE_SECS: f64 = 20e-3;

/// A photo's survey metadata plus the camera fields used to describe the
/// survey's camera.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMetadata {
    pub photo: LocalPhoto,
    pub camera_model: Option<String>,
    pub focal_length: Option<u32>,
}

pub fn read_metadata(path: &Path) -> Result<PhotoMetadata> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .with_context(|| format!("Failed to read EXIF data from {}", path.display()))?;
    from_exif(path, &exif)
}

/// Reads every photo in order; the first unreadable photo fails the batch.
pub fn read_all(paths: &[impl AsRef<Path>]) -> Result<Vec<PhotoMetadata>> {
    paths.iter().map(|p| read_metadata(p.as_ref())).collect()
}

pub fn from_exif(path: &Path, exif: &Exif) -> Result<PhotoMetadata> {
    let missing = |what: &str| anyhow!("{} has no {} in its EXIF data", path.display(), what);

    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')
        .ok_or_else(|| missing("GPS latitude"))?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')
        .ok_or_else(|| missing("GPS longitude"))?;

    let mut altitude = rational(exif, Tag::GPSAltitude).unwrap_or(0.0);
    if uint(exif, Tag::GPSAltitudeRef) == Some(1) {
        altitude = -altitude;
    }

    let width = uint(exif, Tag::PixelXDimension)
        .or_else(|| uint(exif, Tag::ImageWidth))
        .ok_or_else(|| missing("image width"))?;
    let height = uint(exif, Tag::PixelYDimension)
        .or_else(|| uint(exif, Tag::ImageLength))
        .ok_or_else(|| missing("image height"))?;

    let captured_at = ascii_bytes(exif, Tag::DateTimeOriginal)
        .or_else(|| ascii_bytes(exif, Tag::DateTime))
        .and_then(|raw| capture_time(raw, ascii_bytes(exif, Tag::OffsetTimeOriginal)))
        .ok_or_else(|| missing("capture time"))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PhotoMetadata {
        photo: LocalPhoto {
            path: path.to_path_buf(),
            file_name,
            width,
            height,
            latitude,
            longitude,
            altitude,
            captured_at,
            exposure_secs: rational(exif, Tag::ExposureTime).unwrap_or(DEFAULT_EXPOSURE_SECS),
        },
        camera_model: ascii_bytes(exif, Tag::Model)
            .map(|m| String::from_utf8_lossy(m).trim().to_string())
            .filter(|m| !m.is_empty()),
        focal_length: rational(exif, Tag::FocalLength).map(|f| f.round() as u32),
    })
}

/// Degrees from a degrees/minutes/seconds triple.
pub fn dms_to_degrees(parts: &[Rational], negative: bool) -> Option<f64> {
    let degrees = parts.first()?.to_f64();
    let minutes = parts.get(1).map_or(0.0, Rational::to_f64);
    let seconds = parts.get(2).map_or(0.0, Rational::to_f64);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// UTC capture time from an EXIF `YYYY:MM:DD HH:MM:SS` value. Without an
/// offset the camera clock is taken to be UTC.
pub fn capture_time(raw: &[u8], offset: Option<&[u8]>) -> Option<DateTime<Utc>> {
    let mut parsed = exif::DateTime::from_ascii(raw).ok()?;
    if let Some(offset) = offset {
        // An unparsable offset leaves the time as UTC.
        let _ = parsed.parse_offset(offset);
    }

    let local = NaiveDate::from_ymd_opt(
        i32::from(parsed.year),
        u32::from(parsed.month),
        u32::from(parsed.day),
    )?
    .and_hms_opt(
        u32::from(parsed.hour),
        u32::from(parsed.minute),
        u32::from(parsed.second),
    )?;
    let utc = local - chrono::Duration::minutes(i64::from(parsed.offset.unwrap_or(0)));
    Some(Utc.from_utc_datetime(&utc))
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    let negative = ascii_bytes(exif, ref_tag)
        .and_then(|r| r.first().copied())
        .map_or(false, |c| c.eq_ignore_ascii_case(&negative_ref));
    dms_to_degrees(parts, negative)
}

fn rational(exif: &Exif, tag: Tag) -> Option<f64> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => v.first().map(Rational::to_f64).filter(|f| f.is_finite()),
        _ => None,
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn ascii_bytes(exif: &Exif, tag: Tag) -> Option<&[u8]> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(v) => v.first().map(Vec::as_slice),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::Field;
    use std::io::Cursor;

    fn r(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    fn field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    fn ascii(s: &str) -> Value {
        Value::Ascii(vec![s.as_bytes().to_vec()])
    }

    #[test]
    fn dms_converts_to_signed_degrees() {
        let parts = [r(61, 1), r(27, 1), r(1800, 100)];
        let degrees = dms_to_degrees(&parts, false).unwrap();
        assert!((degrees - 61.455).abs() < 1e-9);
        assert!((dms_to_degrees(&parts, true).unwrap() + 61.455).abs() < 1e-9);
        assert!(dms_to_degrees(&[], false).is_none());
    }

    #[test]
    fn capture_time_applies_offset() {
        let utc = capture_time(b"2018:05:29 10:07:25", None).unwrap();
        assert_eq!(
            utc.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "2018-05-29T10:07:25.000Z"
        );

        let shifted = capture_time(b"2018:05:29 10:07:25", Some(b"+03:00")).unwrap();
        assert_eq!(
            shifted.format("%H:%M").to_string(),
            "07:07"
        );

        assert!(capture_time(b"not a date", None).is_none());
    }

    #[test]
    fn reads_survey_fields_from_exif() {
        let fields = vec![
            field(Tag::Model, ascii("SONY_UMC-R10C")),
            field(Tag::DateTimeOriginal, ascii("2018:05:29 10:07:25")),
            field(Tag::ExposureTime, Value::Rational(vec![r(1, 1000)])),
            field(Tag::FocalLength, Value::Rational(vec![r(159, 10)])),
            field(Tag::PixelXDimension, Value::Long(vec![5456])),
            field(Tag::PixelYDimension, Value::Long(vec![3632])),
            field(Tag::GPSLatitudeRef, ascii("N")),
            field(
                Tag::GPSLatitude,
                Value::Rational(vec![r(61, 1), r(27, 1), r(0, 1)]),
            ),
            field(Tag::GPSLongitudeRef, ascii("W")),
            field(
                Tag::GPSLongitude,
                Value::Rational(vec![r(23, 1), r(30, 1), r(0, 1)]),
            ),
            field(Tag::GPSAltitude, Value::Rational(vec![r(1325, 10)])),
        ];
        let mut writer = Writer::new();
        for f in &fields {
            writer.push_field(f);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        let exif = exif::Reader::new().read_raw(buf.into_inner()).unwrap();

        let meta = from_exif(Path::new("/data/DSC0001.JPG"), &exif).unwrap();
        assert_eq!(meta.photo.file_name, "DSC0001.JPG");
        assert_eq!(meta.photo.width, 5456);
        assert_eq!(meta.photo.height, 3632);
        assert!((meta.photo.latitude - 61.45).abs() < 1e-9);
        assert!((meta.photo.longitude + 23.5).abs() < 1e-9);
        assert!((meta.photo.altitude - 132.5).abs() < 1e-9);
        assert!((meta.photo.exposure_secs - 0.001).abs() < 1e-12);
        assert_eq!(meta.camera_model.as_deref(), Some("SONY_UMC-R10C"));
        assert_eq!(meta.focal_length, Some(16));
    }

    #[test]
    fn missing_gps_is_an_error() {
        let fields = vec![
            field(Tag::DateTimeOriginal, ascii("2018:05:29 10:07:25")),
            field(Tag::PixelXDimension, Value::Long(vec![100])),
            field(Tag::PixelYDimension, Value::Long(vec![100])),
        ];
        let mut writer = Writer::new();
        for f in &fields {
            writer.push_field(f);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        let exif = exif::Reader::new().read_raw(buf.into_inner()).unwrap();

        let err = from_exif(Path::new("/data/a.jpg"), &exif).unwrap_err();
        assert!(err.to_string().contains("GPS latitude"));
    }

    #[test]
    fn non_jpeg_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(read_metadata(&path).is_err());
    }
}
