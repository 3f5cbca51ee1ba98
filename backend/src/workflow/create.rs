//! Create-job form state and submission.

use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::clients::{PrimaryClient, SecondaryClient};
use crate::errors::AppError;
use crate::models::{points_to_csv, CreateJobPayload, FieldMapping, RowTable, SITE_BASED};

pub const NAME_TAKEN: &str = "Name is already in use";

/// Everything the create form holds between events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub country: String,
    pub name: String,
    pub level: String,
    pub groups: Vec<String>,
    /// Rows to submit instead of a point lookup
    pub rows: Option<RowTable>,
    pub name_text: Option<String>,
    pub error_table: Option<RowTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    CountryChanged(String),
    NameChanged {
        value: String,
        taken_names: Vec<String>,
    },
    LevelChanged(String),
    GroupsChanged(Vec<String>),
    RowsSupplied(RowTable),
    SubmitFailed(RowTable),
    RemoveErrorRows,
}

pub fn reduce(state: FormState, event: FormEvent) -> FormState {
    match event {
        FormEvent::CountryChanged(country) => FormState { country, ..state },
        FormEvent::NameChanged { value, taken_names } => {
            let taken = taken_names
                .iter()
                .any(|name| name.to_lowercase() == value.to_lowercase());
            if taken {
                FormState {
                    name: String::new(),
                    name_text: Some(NAME_TAKEN.to_string()),
                    ..state
                }
            } else {
                FormState {
                    name: value,
                    name_text: None,
                    ..state
                }
            }
        }
        FormEvent::LevelChanged(level) => FormState { level, ..state },
        FormEvent::GroupsChanged(groups) => FormState { groups, ..state },
        FormEvent::RowsSupplied(rows) => FormState {
            rows: Some(rows),
            ..state
        },
        FormEvent::SubmitFailed(table) => FormState {
            error_table: Some(table.sorted_by_error()),
            ..state
        },
        FormEvent::RemoveErrorRows => match state.error_table {
            Some(table) => {
                let cleaned = table.without_error_rows();
                FormState {
                    rows: Some(cleaned.clone()),
                    error_table: Some(cleaned),
                    ..state
                }
            }
            None => FormState {
                error_table: None,
                ..state
            },
        },
    }
}

/// A form that passed its required-field checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub country: String,
    pub name: String,
    pub level: String,
    pub groups: Vec<String>,
    pub rows: Option<RowTable>,
}

impl FormState {
    /// Check required fields in form order and report the first one missing.
    pub fn submission(&self) -> Result<Submission, AppError> {
        if self.country.is_empty() {
            return Err(AppError::validation("Country required"));
        }
        if self.name.is_empty() {
            return Err(match &self.name_text {
                Some(text) => AppError::DuplicateName(text.clone()),
                None => AppError::validation("Name required"),
            });
        }
        if self.level.is_empty() {
            return Err(AppError::validation("Level required"));
        }

        Ok(Submission {
            country: self.country.clone(),
            name: self.name.clone(),
            level: self.level.clone(),
            groups: self.groups.clone(),
            rows: self.rows.clone(),
        })
    }
}

/// Create-job request as sent by the admin UI.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Cleaned rows from a previous rejected attempt
    #[serde(default)]
    pub rows: Option<RowTable>,
}

impl CreateJobRequest {
    /// Replay the request as form events.
    pub fn into_form(self, taken_names: Vec<String>) -> FormState {
        let mut events = vec![
            FormEvent::CountryChanged(self.country),
            FormEvent::NameChanged {
                value: self.name,
                taken_names,
            },
            FormEvent::LevelChanged(self.level),
            FormEvent::GroupsChanged(self.groups),
        ];
        if let Some(rows) = self.rows {
            events.push(FormEvent::RowsSupplied(rows));
        }
        events.into_iter().fold(FormState::default(), reduce)
    }
}

/// Build the site table and submit the job.
///
/// Without supplied rows, point facilities of the chosen level and groups are used;
/// an empty lookup is `NotFound` and nothing is submitted.
pub async fn create_job(
    primary: &PrimaryClient,
    secondary: &SecondaryClient,
    credential: &Credential,
    submission: Submission,
) -> Result<(), AppError> {
    let csv = match &submission.rows {
        Some(rows) => rows.to_csv()?,
        None => {
            let points = secondary
                .valid_points(&submission.level, &submission.groups)
                .await?;
            if points.is_empty() {
                return Err(AppError::NotFound("Not Found".to_string()));
            }
            tracing::debug!("Using {} facility points", points.len());
            points_to_csv(&points)?
        }
    };

    let payload = CreateJobPayload {
        fields: FieldMapping::default(),
        name: submission.name,
        country: submission.country,
        csv,
        algorithm: SITE_BASED.to_string(),
    };
    primary.create_job(credential, &payload).await
}
