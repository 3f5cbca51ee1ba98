//! DHIS2 hierarchy lookups used by the create form.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::clients::check_feature_ids;
use crate::errors::AppError;
use crate::models::{Attribute, FeatureCollection, OrgUnit, OrgUnitGroup, OrgUnitLevel, ValidPoint};
use crate::AppState;

/// Level and comma-separated group ids.
#[derive(Debug, Deserialize)]
pub struct FeatureQuery {
    pub level: String,
    #[serde(default)]
    pub groups: Option<String>,
}

impl FeatureQuery {
    fn group_ids(&self) -> Vec<String> {
        self.groups
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.level.trim().is_empty() {
            return Err(AppError::validation("Level required"));
        }
        check_feature_ids(&self.level, &self.group_ids())
    }
}

/// GET /api/org-unit-levels
pub async fn list_org_unit_levels(State(state): State<AppState>) -> ApiResult<Vec<OrgUnitLevel>> {
    success(state.secondary.org_unit_levels().await?)
}

/// GET /api/org-unit-groups
pub async fn list_org_unit_groups(State(state): State<AppState>) -> ApiResult<Vec<OrgUnitGroup>> {
    success(state.secondary.org_unit_groups().await?)
}

/// GET /api/org-units
pub async fn list_org_units(State(state): State<AppState>) -> ApiResult<Vec<OrgUnit>> {
    success(state.secondary.org_units().await?)
}

/// GET /api/attributes - GEOJSON organisation-unit attributes.
pub async fn list_attributes(State(state): State<AppState>) -> ApiResult<Vec<Attribute>> {
    success(state.secondary.geojson_attributes().await?)
}

/// GET /api/geo-features?level=&groups=
pub async fn get_geo_features(
    State(state): State<AppState>,
    Query(query): Query<FeatureQuery>,
) -> ApiResult<FeatureCollection> {
    query.validate()?;
    success(
        state
            .secondary
            .feature_collection(&query.level, &query.group_ids())
            .await?,
    )
}

/// GET /api/valid-points?level=&groups=
pub async fn get_valid_points(
    State(state): State<AppState>,
    Query(query): Query<FeatureQuery>,
) -> ApiResult<Vec<ValidPoint>> {
    query.validate()?;
    success(
        state
            .secondary
            .valid_points(&query.level, &query.group_ids())
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ids_split() {
        let query = FeatureQuery {
            level: "4".into(),
            groups: Some("a, b,,c".into()),
        };
        assert_eq!(query.group_ids(), vec!["a", "b", "c"]);

        let query = FeatureQuery {
            level: "4".into(),
            groups: None,
        };
        assert!(query.group_ids().is_empty());
    }
}
