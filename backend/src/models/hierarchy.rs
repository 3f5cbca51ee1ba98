//! DHIS2 organisation hierarchy metadata.

use serde::{Deserialize, Serialize};

/// Value type of attributes that carry catchment geometry.
pub const GEOJSON_VALUE_TYPE: &str = "GEOJSON";

/// Prefix of every attribute created by a publish.
pub const ATTRIBUTE_PREFIX: &str = "Crosscut ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgUnitLevel {
    pub id: String,
    pub name: String,
    pub level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgUnitGroup {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgUnit {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    pub id: String,
    pub name: String,
}

/// A map view referencing an attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /attributes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAttribute {
    pub name: String,
    pub short_name: String,
    pub organisation_unit_attribute: bool,
    pub value_type: String,
}

impl NewAttribute {
    /// GEOJSON org-unit attribute named after a catchment job.
    pub fn for_job(job_name: &str) -> Self {
        let name = attribute_name(job_name);
        Self {
            short_name: name.clone(),
            name,
            organisation_unit_attribute: true,
            value_type: GEOJSON_VALUE_TYPE.to_string(),
        }
    }
}

/// Attribute name reserved for a job.
pub fn attribute_name(job_name: &str) -> String {
    format!("{}{}", ATTRIBUTE_PREFIX, job_name)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitLevelList {
    pub organisation_unit_levels: Vec<OrgUnitLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitGroupList {
    pub organisation_unit_groups: Vec<OrgUnitGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitList {
    pub organisation_units: Vec<OrgUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeList {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapList {
    pub maps: Vec<MapRef>,
}

/// Import summary returned by metadata writes; only the uid is used.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportSummary {
    #[serde(default)]
    pub response: Option<ImportResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub uid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_attribute_payload() {
        let value = serde_json::to_value(NewAttribute::for_job("North")).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Crosscut North",
                "shortName": "Crosscut North",
                "organisationUnitAttribute": true,
                "valueType": "GEOJSON"
            })
        );
    }

    #[test]
    fn test_import_summary_uid() {
        let summary: ImportSummary = serde_json::from_value(json!({
            "httpStatus": "Created",
            "response": {"uid": "Xyz123", "klass": "Attribute"}
        }))
        .unwrap();
        assert_eq!(summary.response.and_then(|r| r.uid).as_deref(), Some("Xyz123"));
    }
}
