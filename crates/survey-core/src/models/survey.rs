use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Area placeholder sent with every survey; the service recomputes it.
pub const DEFAULT_SURVEY_AREA: f64 = 1000.0;

/// Industry tag for photogrammetry surveys.
pub const DEFAULT_INDUSTRY: &str = "Geospatial";

/// Relative amount a degenerate bounding box is widened on each side.
const DEGENERATE_WIDENING: f64 = 0.0001;

/// Lower bound for the widening, for coordinates at exactly zero.
const MIN_WIDENING_DEG: f64 = 1e-6;

/// Body of `POST /uisrv/projects/survey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub name: String,
    pub add_project_to_users: bool,
    pub geometry: Geometries,
    pub cameras: Vec<Camera>,
    pub area: f64,
    pub process_settings: ProcessSettings,
    pub survey_date: String,
    pub number_of_photos: usize,
    pub industry: String,
}

impl Survey {
    pub fn new(
        name: impl Into<String>,
        bounding_box: &BoundingBox,
        camera: Camera,
        number_of_photos: usize,
        survey_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            add_project_to_users: true,
            geometry: Geometries {
                kind: "GeometryCollection".to_string(),
                geometries: vec![bounding_box.to_polygon()],
            },
            cameras: vec![camera],
            area: DEFAULT_SURVEY_AREA,
            process_settings: ProcessSettings::default(),
            survey_date: survey_date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            number_of_photos,
            industry: DEFAULT_INDUSTRY.to_string(),
        }
    }
}

/// Camera record. `_id` is only present once the service has registered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometries {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometries: Vec<Polygon>,
}

/// GeoJSON polygon; coordinates are `[longitude, latitude]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSettings {
    pub map_type: String,
    pub inspection: Inspection,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            map_type: String::new(),
            inspection: Inspection { video: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub video: bool,
}

/// Latitude/longitude extent of a photo set, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Extent of `(latitude, longitude)` positions. Returns `None` for an
    /// empty input. A zero-width or zero-height extent is widened so the
    /// resulting polygon is never degenerate.
    pub fn from_positions<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = positions.into_iter();
        let (lat, lon) = iter.next()?;
        let mut bbox = Self {
            min_lat: lat,
            max_lat: lat,
            min_lon: lon,
            max_lon: lon,
        };
        for (lat, lon) in iter {
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
        }

        if bbox.min_lat == bbox.max_lat {
            let d = widening(bbox.min_lat);
            bbox.min_lat -= d;
            bbox.max_lat += d;
        }
        if bbox.min_lon == bbox.max_lon {
            let d = widening(bbox.min_lon);
            bbox.min_lon -= d;
            bbox.max_lon += d;
        }
        Some(bbox)
    }

    /// Closed rectangular ring, counter-clockwise from the south-west corner.
    pub fn to_polygon(&self) -> Polygon {
        let ring = vec![
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ];
        Polygon {
            kind: "Polygon".to_string(),
            coordinates: vec![ring],
        }
    }
}

fn widening(value: f64) -> f64 {
    (value.abs() * DEGENERATE_WIDENING).max(MIN_WIDENING_DEG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bounding_box_covers_all_positions() {
        let bbox = BoundingBox::from_positions(vec![
            (61.4527, 23.8644),
            (61.4530, 23.8654),
            (61.4529, 23.8650),
        ])
        .unwrap();
        assert_eq!(bbox.min_lat, 61.4527);
        assert_eq!(bbox.max_lat, 61.4530);
        assert_eq!(bbox.min_lon, 23.8644);
        assert_eq!(bbox.max_lon, 23.8654);
    }

    #[test]
    fn bounding_box_empty_is_none() {
        assert!(BoundingBox::from_positions(Vec::new()).is_none());
    }

    #[test]
    fn degenerate_box_is_widened_for_negative_coordinates() {
        let bbox = BoundingBox::from_positions(vec![(-33.9, -70.6)]).unwrap();
        assert!(bbox.min_lat < bbox.max_lat);
        assert!(bbox.min_lon < bbox.max_lon);
        assert!(bbox.min_lat < -33.9 && bbox.max_lat > -33.9);
    }

    #[test]
    fn degenerate_box_at_zero_is_widened() {
        let bbox = BoundingBox::from_positions(vec![(0.0, 0.0)]).unwrap();
        assert!(bbox.min_lat < bbox.max_lat);
        assert!(bbox.min_lon < bbox.max_lon);
    }

    #[test]
    fn polygon_ring_is_closed_lon_lat() {
        let bbox = BoundingBox {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lon: 10.0,
            max_lon: 20.0,
        };
        let polygon = bbox.to_polygon();
        let ring = &polygon.coordinates[0];
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[0], [10.0, 1.0]);
        assert_eq!(ring[2], [20.0, 2.0]);
    }

    #[test]
    fn survey_serializes_camel_case() {
        let bbox = BoundingBox {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lon: 10.0,
            max_lon: 20.0,
        };
        let camera = Camera {
            model: Some("SONY_UMC-R10C".into()),
            focal_length: Some(24),
            width: Some(5456),
            height: Some(3632),
            aspect_ratio: Some(5456.0 / 3632.0),
            ..Default::default()
        };
        let date = Utc.with_ymd_and_hms(2018, 4, 12, 0, 0, 0).unwrap();
        let survey = Survey::new("field-7", &bbox, camera, 5, date);
        let json = serde_json::to_value(&survey).unwrap();

        assert_eq!(json["name"], "field-7");
        assert_eq!(json["addProjectToUsers"], true);
        assert_eq!(json["numberOfPhotos"], 5);
        assert_eq!(json["surveyDate"], "2018-04-12T00:00:00.000Z");
        assert_eq!(json["industry"], "Geospatial");
        assert_eq!(json["geometry"]["type"], "GeometryCollection");
        assert_eq!(json["geometry"]["geometries"][0]["type"], "Polygon");
        assert_eq!(json["cameras"][0]["focalLength"], 24);
        assert!(json["cameras"][0].get("_id").is_none());
        assert_eq!(json["processSettings"]["inspection"]["video"], false);
    }
}
