use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::ProjectDescriptor;

/// WGS 84 geographic coordinate system, sent as each photo's horizontal SRS.
pub const HORIZONTAL_SRS_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

/// EGM96 geoid heights, sent as each photo's vertical SRS.
pub const VERTICAL_SRS_WKT: &str = r#"VERT_CS["EGM96 geoid (meters)",VERT_DATUM["EGM96 geoid",2005,EXTENSION["PROJ4_GRIDS","egm96_15.gtx"],AUTHORITY["EPSG","5171"]],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Up",UP]]"#;

/// Status every photo is registered with.
pub const UPLOADING_STATUS: &str = "uploading";

/// RTK fix quality reported for photos without RTK information.
pub const DEFAULT_RTC: i32 = 4;

/// Metadata of one local photo, as produced by the metadata extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPhoto {
    pub path: PathBuf,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub captured_at: DateTime<Utc>,
    pub exposure_secs: f64,
}

/// GeoJSON point, `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

/// One photo in a batch registration request or response. The request
/// carries metadata only; the response adds the server-assigned `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Local path of the photo; the service echoes it back unchanged.
    #[serde(default)]
    pub seq: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(rename = "UTC", default, skip_serializing_if = "Option::is_none")]
    pub utc: Option<String>,
    #[serde(rename = "RTC", default, skip_serializing_if = "Option::is_none")]
    pub rtc: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_srs_wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_srs_wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpened: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<PhotoGeometry>,
}

impl PhotoRecord {
    /// Registration record for `photo`, attributed to `camera_id` within the
    /// created project.
    pub fn for_upload(photo: &LocalPhoto, project: &ProjectDescriptor, camera_id: &str) -> Self {
        let utc = photo
            .captured_at
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        Self {
            id: None,
            seq: Some(photo.path.to_string_lossy().into_owned()),
            file_name: Some(photo.file_name.clone()),
            altitude: Some(photo.altitude),
            upload_id: Some(format!("{}{}{}", camera_id, project.mission_id(), utc)),
            utc: Some(utc),
            rtc: Some(DEFAULT_RTC),
            camera: Some(camera_id.to_string()),
            width: Some(photo.width),
            height: Some(photo.height),
            vertical_srs_wkt: Some(VERTICAL_SRS_WKT.to_string()),
            horizontal_srs_wkt: Some(HORIZONTAL_SRS_WKT.to_string()),
            flight: Some(project.flight_id().to_string()),
            status: Some(UPLOADING_STATUS.to_string()),
            sharpened: Some(false),
            shutter: Some(photo.exposure_secs),
            geometry: Some(PhotoGeometry {
                kind: "Point".to_string(),
                coordinates: vec![photo.longitude, photo.latitude],
            }),
        }
    }
}

/// Body of `POST /dxpm/photos` and its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
}

impl PhotoBatch {
    pub fn for_project(project: &ProjectDescriptor, photos: Vec<PhotoRecord>) -> Self {
        Self {
            project: Some(project.project_id().to_string()),
            mission: Some(project.mission_id().to_string()),
            flight: Some(project.flight_id().to_string()),
            photos,
        }
    }
}
