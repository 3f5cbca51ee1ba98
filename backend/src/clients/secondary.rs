//! Client for the DHIS2 web API.

use reqwest::{header, Method, RequestBuilder};
use serde_json::{json, Map, Value};

use super::{check, check_found};
use crate::config::Dhis2Auth;
use crate::errors::AppError;
use crate::models::{
    Attribute, AttributeList, FeatureCollection, GeoFeatureWire, Geometry, ImportSummary, MapList,
    MapRef, NewAttribute, OrgUnit, OrgUnitGroup, OrgUnitGroupList, OrgUnitLevel,
    OrgUnitLevelList, OrgUnitList, ValidPoint,
};

const JSON_PATCH: &str = "application/json-patch+json";

/// `:all,attributeValues[:all,attribute[id,name,displayName]]`, pre-encoded.
const FULL_ORG_UNIT_FIELDS: &str =
    "%3Aall%2CattributeValues%5B%3Aall%2Cattribute%5Bid%2Cname%2CdisplayName%5D%5D";

/// DHIS2 uids and level ids are plain alphanumerics; anything else would leak into the query.
pub fn is_dhis2_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Reject a level or group id that is not a bare DHIS2 identifier.
pub fn check_feature_ids(level: &str, groups: &[String]) -> Result<(), AppError> {
    if !is_dhis2_id(level) {
        return Err(AppError::validation(format!("Invalid level id: {}", level)));
    }
    if let Some(bad) = groups.iter().find(|id| !is_dhis2_id(id)) {
        return Err(AppError::validation(format!("Invalid group id: {}", bad)));
    }
    Ok(())
}

/// Query path of the geo-feature endpoint for a level and a set of groups.
///
/// With several groups every id is prefixed with `%3BOU_GROUP-` and the list is
/// comma-joined after the first `OU_GROUP-`. The DHIS2 instances in use accept
/// exactly this form, so it is kept byte for byte.
pub fn geo_features_path(level: &str, groups: &[String]) -> String {
    let group_link = if groups.len() > 1 {
        groups
            .iter()
            .map(|id| format!("%3BOU_GROUP-{}", id))
            .collect::<Vec<_>>()
            .join(",")
    } else {
        groups.join(",")
    };

    format!(
        "/geoFeatures?ou=ou%3ALEVEL-{}%3BOU_GROUP-{}&displayProperty=NAME",
        level, group_link
    )
}

/// Thin wrapper over the DHIS2 metadata and geo-feature endpoints.
#[derive(Clone)]
pub struct SecondaryClient {
    http: reqwest::Client,
    base_url: String,
    auth: Dhis2Auth,
}

impl SecondaryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, auth: Dhis2Auth) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            auth,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.auth {
            Dhis2Auth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Dhis2Auth::Token(token) => {
                request.header(header::AUTHORIZATION, format!("ApiToken {}", token))
            }
            Dhis2Auth::None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let response = check(self.request(Method::GET, path).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn org_unit_levels(&self) -> Result<Vec<OrgUnitLevel>, AppError> {
        let list: OrgUnitLevelList = self
            .get_json("/organisationUnitLevels.json?fields=id,displayName~rename(name),level&paging=false&order=level:asc")
            .await?;
        Ok(list.organisation_unit_levels)
    }

    pub async fn org_unit_groups(&self) -> Result<Vec<OrgUnitGroup>, AppError> {
        let list: OrgUnitGroupList = self
            .get_json("/organisationUnitGroups.json?fields=id,displayName~rename(name)&paging=false")
            .await?;
        Ok(list.organisation_unit_groups)
    }

    pub async fn org_units(&self) -> Result<Vec<OrgUnit>, AppError> {
        let list: OrgUnitList = self
            .get_json("/organisationUnits.json?fields=id,displayName~rename(name)&paging=false")
            .await?;
        Ok(list.organisation_units)
    }

    /// Organisation-unit attributes of value type GEOJSON.
    pub async fn geojson_attributes(&self) -> Result<Vec<Attribute>, AppError> {
        let list: AttributeList = self
            .get_json("/attributes.json?fields=id,name&filter=valueType:eq:GEOJSON&filter=organisationUnitAttribute:eq:true&paging=false")
            .await?;
        Ok(list.attributes)
    }

    /// Maps whose views are keyed on the given attribute.
    pub async fn maps_using_attribute(&self, attribute_id: &str) -> Result<Vec<MapRef>, AppError> {
        let list: MapList = self
            .get_json(&format!(
                "/maps.json?filter=mapViews.orgUnitField:eq:{}",
                attribute_id
            ))
            .await?;
        Ok(list.maps)
    }

    pub async fn geo_features(
        &self,
        level: &str,
        groups: &[String],
    ) -> Result<Vec<GeoFeatureWire>, AppError> {
        check_feature_ids(level, groups)?;
        self.get_json(&geo_features_path(level, groups)).await
    }

    /// Geo features of a level and group set, expanded to GeoJSON.
    pub async fn feature_collection(
        &self,
        level: &str,
        groups: &[String],
    ) -> Result<FeatureCollection, AppError> {
        let features = self
            .geo_features(level, groups)
            .await?
            .into_iter()
            .map(GeoFeatureWire::into_feature)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureCollection::new(features))
    }

    /// Point facilities of a level and group set.
    pub async fn valid_points(
        &self,
        level: &str,
        groups: &[String],
    ) -> Result<Vec<ValidPoint>, AppError> {
        self.geo_features(level, groups)
            .await?
            .into_iter()
            .filter(GeoFeatureWire::is_point)
            .map(GeoFeatureWire::into_point)
            .collect()
    }

    /// Create an attribute and return its generated uid.
    pub async fn create_attribute(&self, attribute: &NewAttribute) -> Result<String, AppError> {
        let response = check(
            self.request(Method::POST, "/attributes")
                .json(attribute)
                .send()
                .await?,
        )
        .await?;
        let summary: ImportSummary = response.json().await?;

        summary
            .response
            .and_then(|r| r.uid)
            .ok_or_else(|| AppError::Upstream {
                status: 200,
                message: format!("no uid returned for attribute {}", attribute.name),
            })
    }

    /// Append a geometry value for `attribute_id` to an organisation unit.
    pub async fn add_attribute_value(
        &self,
        org_unit_id: &str,
        attribute_id: &str,
        geometry: &Geometry,
    ) -> Result<(), AppError> {
        let patch = json!([{
            "op": "add",
            "path": "/attributeValues/-",
            "value": {
                "value": serde_json::to_string(geometry)?,
                "attribute": { "id": attribute_id },
            },
        }]);

        let request = self
            .request(Method::PATCH, &format!("/organisationUnits/{}", org_unit_id))
            .header(header::CONTENT_TYPE, JSON_PATCH)
            .body(serde_json::to_vec(&patch)?);
        check(request.send().await?).await?;
        Ok(())
    }

    /// Full organisation-unit record, including attribute values.
    pub async fn org_unit_record(&self, org_unit_id: &str) -> Result<Map<String, Value>, AppError> {
        let path = format!(
            "/organisationUnits/{}?fields={}",
            org_unit_id, FULL_ORG_UNIT_FIELDS
        );
        let response = check_found(self.request(Method::GET, &path).send().await?, || {
            format!("Organisation unit {} not found", org_unit_id)
        })
        .await?;
        Ok(response.json().await?)
    }

    /// Overwrite an organisation unit; fields missing from `record` are dropped server-side.
    pub async fn replace_org_unit(
        &self,
        org_unit_id: &str,
        record: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let path = format!("/organisationUnits/{}?mergeMode=REPLACE", org_unit_id);
        check(self.request(Method::PUT, &path).json(record).send().await?).await?;
        Ok(())
    }

    pub async fn delete_attribute(&self, attribute_id: &str) -> Result<(), AppError> {
        let path = format!("/attributes/{}", attribute_id);
        check(self.request(Method::DELETE, &path).send().await?).await?;
        Ok(())
    }
}
