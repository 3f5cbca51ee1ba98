//! GeoJSON types and decoding of the compact DHIS2 geo-feature format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Feature property naming the organisation unit that owns a catchment.
pub const OWNER_PROPERTY: &str = "user:orgUnitId";

/// A geo feature as returned by `GET /geoFeatures`.
///
/// `co` is a JSON array encoded as a string, `ty` is 1 for points and 2 for
/// polygons, `na`/`le`/`pn`/`pi` are name, level, parent name and parent id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoFeatureWire {
    pub id: String,
    pub co: String,
    pub ty: u8,
    #[serde(default)]
    pub na: Option<String>,
    #[serde(default)]
    pub le: Option<i64>,
    #[serde(default)]
    pub pn: Option<String>,
    #[serde(default)]
    pub pi: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

pub const POINT: &str = "Point";
pub const POLYGON: &str = "Polygon";

/// Geometry object of a GeoJSON feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

/// A GeoJSON feature with free-form properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Id of the organisation unit this catchment belongs to.
    pub fn owner_org_unit(&self) -> Option<&str> {
        self.properties.get(OWNER_PROPERTY).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

impl GeoFeatureWire {
    fn coordinates(&self) -> Result<Value, AppError> {
        serde_json::from_str(&self.co).map_err(|e| {
            AppError::Transport(format!("geo feature {} has malformed coordinates: {}", self.id, e))
        })
    }

    pub fn is_point(&self) -> bool {
        self.ty == 1
    }

    /// Expand into a GeoJSON feature. Anything other than `ty == 2` is a point.
    pub fn into_feature(self) -> Result<Feature, AppError> {
        let coordinates = self.coordinates()?;
        let kind = if self.ty == 2 { POLYGON } else { POINT };

        let mut properties = Map::new();
        properties.insert("id".into(), Value::String(self.id.clone()));
        properties.insert("name".into(), opt(self.na.map(Value::String)));
        properties.insert("level".into(), opt(self.le.map(Value::from)));
        properties.insert("parentName".into(), opt(self.pn.map(Value::String)));
        properties.insert("parentId".into(), opt(self.pi.map(Value::String)));

        Ok(Feature {
            kind: "Feature".to_string(),
            id: Some(Value::String(self.id)),
            geometry: Geometry {
                kind: kind.to_string(),
                coordinates,
            },
            properties,
        })
    }

    /// Flatten a point feature into a row for a new catchment job.
    pub fn into_point(self) -> Result<ValidPoint, AppError> {
        let coordinates: Vec<f64> = serde_json::from_value(self.coordinates()?)?;
        let (Some(&long), Some(&lat)) = (coordinates.first(), coordinates.get(1)) else {
            return Err(AppError::Transport(format!(
                "geo feature {} is not a point",
                self.id
            )));
        };

        Ok(ValidPoint {
            lat,
            long,
            name: self.na,
            level: self.le,
            parent_name: self.pn,
            parent_id: self.pi,
            code: self.code,
            org_unit_id: self.id,
        })
    }
}

fn opt(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}

/// A facility point usable as a catchment site.
///
/// Field order is the CSV column order sent to the job service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidPoint {
    pub lat: f64,
    pub long: f64,
    pub name: Option<String>,
    pub level: Option<i64>,
    pub parent_name: Option<String>,
    pub parent_id: Option<String>,
    pub code: Option<String>,
    pub org_unit_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(ty: u8, co: &str) -> GeoFeatureWire {
        GeoFeatureWire {
            id: "ou1".into(),
            co: co.into(),
            ty,
            na: Some("Ngelehun CHC".into()),
            le: Some(4),
            pn: Some("Badjia".into()),
            pi: Some("YuQRtpLP10I".into()),
            code: None,
        }
    }

    #[test]
    fn test_polygon_decoding() {
        let feature = wire(2, "[[0,0],[1,1]]").into_feature().unwrap();
        assert_eq!(
            serde_json::to_value(&feature.geometry).unwrap(),
            json!({"type": "Polygon", "coordinates": [[0, 0], [1, 1]]})
        );
        assert_eq!(feature.properties["name"], "Ngelehun CHC");
        assert_eq!(feature.properties["level"], 4);
        assert_eq!(feature.properties["parentName"], "Badjia");
        assert_eq!(feature.properties["parentId"], "YuQRtpLP10I");
        assert_eq!(feature.properties["id"], "ou1");
    }

    #[test]
    fn test_point_decoding() {
        let feature = wire(1, "[-11.5,8.1]").into_feature().unwrap();
        assert_eq!(feature.geometry.kind, "Point");
        assert_eq!(feature.geometry.coordinates, json!([-11.5, 8.1]));
    }

    #[test]
    fn test_malformed_coordinates() {
        assert!(wire(1, "not json").into_feature().is_err());
    }

    #[test]
    fn test_point_row_swaps_axes() {
        let point = wire(1, "[-11.5,8.1]").into_point().unwrap();
        assert_eq!(point.lat, 8.1);
        assert_eq!(point.long, -11.5);
        assert_eq!(point.org_unit_id, "ou1");
    }

    #[test]
    fn test_owner_property() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": []},
            "properties": {"user:orgUnitId": "abc", "cc:Name": "Clinic"}
        }))
        .unwrap();
        assert_eq!(feature.owner_org_unit(), Some("abc"));
    }
}
