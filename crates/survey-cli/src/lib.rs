//! Building blocks of the `survey-upload` command: photo discovery, EXIF
//! metadata, survey construction and logging setup.

pub mod metadata;
pub mod scan;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use survey_core::{BoundingBox, Camera, LocalPhoto, Survey};

use crate::metadata::PhotoMetadata;

/// Initialize tracing for the CLI.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "survey_upload=info,survey_api_client=info,survey_cli=info",
                )
            }),
        )
        .init();
}

/// Survey covering every photo's position, described by the first photo's
/// camera.
pub fn build_survey(
    name: &str,
    photos: &[PhotoMetadata],
    survey_date: DateTime<Utc>,
) -> Result<Survey> {
    let first = photos
        .first()
        .ok_or_else(|| anyhow!("No photos to build a survey from"))?;
    let bbox = BoundingBox::from_positions(
        photos
            .iter()
            .map(|m| (m.photo.latitude, m.photo.longitude)),
    )
    .ok_or_else(|| anyhow!("No photo positions"))?;

    let camera = Camera {
        id: None,
        model: first.camera_model.clone(),
        focal_length: first.focal_length,
        width: Some(first.photo.width),
        height: Some(first.photo.height),
        aspect_ratio: (first.photo.height > 0)
            .then(|| f64::from(first.photo.width) / f64::from(first.photo.height)),
    };

    Ok(Survey::new(name, &bbox, camera, photos.len(), survey_date))
}

pub fn local_photos(photos: &[PhotoMetadata]) -> Vec<LocalPhoto> {
    photos.iter().map(|m| m.photo.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn meta(lat: f64, lon: f64) -> PhotoMetadata {
        PhotoMetadata {
            photo: LocalPhoto {
                path: PathBuf::from("/data/a.jpg"),
                file_name: "a.jpg".into(),
                width: 4000,
                height: 3000,
                latitude: lat,
                longitude: lon,
                altitude: 100.0,
                captured_at: Utc.with_ymd_and_hms(2018, 5, 29, 10, 0, 0).unwrap(),
                exposure_secs: 0.02,
            },
            camera_model: Some("FC6310".into()),
            focal_length: Some(9),
        }
    }

    #[test]
    fn survey_covers_all_photos() {
        let photos = vec![meta(61.0, 23.0), meta(61.2, 23.4)];
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let survey = build_survey("field-7", &photos, date).unwrap();

        assert_eq!(survey.number_of_photos, 2);
        assert_eq!(survey.cameras[0].model.as_deref(), Some("FC6310"));
        assert_eq!(survey.cameras[0].aspect_ratio, Some(4000.0 / 3000.0));
        let ring = &survey.geometry.geometries[0].coordinates[0];
        assert_eq!(ring[0], [23.0, 61.0]);
        assert_eq!(ring[2], [23.4, 61.2]);
    }

    #[test]
    fn survey_needs_photos() {
        assert!(build_survey("empty", &[], Utc::now()).is_err());
    }
}
