//! Per-job publish button state.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::CatchmentJob;

/// Label of a job's publish control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishStatus {
    Publish,
    Publishing,
    Unpublish,
    Unpublishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishEvent {
    Started,
    Succeeded,
    Failed,
}

impl PublishStatus {
    /// Resting label for a job as stored remotely.
    pub fn of(job: &CatchmentJob) -> Self {
        if job.attribute_id().is_some() {
            PublishStatus::Unpublish
        } else {
            PublishStatus::Publish
        }
    }

    pub fn apply(self, event: PublishEvent) -> Self {
        use PublishEvent::*;
        use PublishStatus::*;

        match (self, event) {
            (Publish, Started) => Publishing,
            (Publishing, Succeeded) => Unpublish,
            (Publishing, Failed) => Publish,
            (Unpublish, Started) => Unpublishing,
            (Unpublishing, Succeeded) => Publish,
            (Unpublishing, Failed) => Unpublish,
            (status, _) => status,
        }
    }

    pub fn in_flight(self) -> bool {
        matches!(self, PublishStatus::Publishing | PublishStatus::Unpublishing)
    }
}

/// In-flight publish/unpublish operations, keyed by job id.
///
/// Only running operations are held; a resting label is always derived from the job.
#[derive(Debug, Default)]
pub struct PublishTracker {
    in_flight: Mutex<HashMap<i64, PublishStatus>>,
}

impl PublishTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, PublishStatus>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current label of a job's publish control.
    pub fn status(&self, job: &CatchmentJob) -> PublishStatus {
        self.lock()
            .get(&job.id)
            .copied()
            .unwrap_or_else(|| PublishStatus::of(job))
    }

    /// Fail unless the job currently shows `expected`.
    pub fn ensure(&self, job: &CatchmentJob, expected: PublishStatus) -> Result<(), AppError> {
        check_status(job.id, self.status(job), expected)
    }

    /// Move the job into its in-flight state. The returned guard records the outcome.
    pub fn begin(
        &self,
        job: &CatchmentJob,
        expected: PublishStatus,
    ) -> Result<InFlight<'_>, AppError> {
        let mut in_flight = self.lock();
        let current = in_flight
            .get(&job.id)
            .copied()
            .unwrap_or_else(|| PublishStatus::of(job));
        check_status(job.id, current, expected)?;

        let next = current.apply(PublishEvent::Started);
        in_flight.insert(job.id, next);
        tracing::debug!("Job {} is now {:?}", job.id, next);

        Ok(InFlight {
            tracker: self,
            job_id: job.id,
            status: next,
            finished: false,
        })
    }

    fn finish(&self, job_id: i64, from: PublishStatus, event: PublishEvent) -> PublishStatus {
        self.lock().remove(&job_id);
        let next = from.apply(event);
        tracing::debug!("Job {} is now {:?}", job_id, next);
        next
    }
}

fn check_status(job_id: i64, current: PublishStatus, expected: PublishStatus) -> Result<(), AppError> {
    if current == expected {
        return Ok(());
    }
    let message = if current.in_flight() {
        format!("Job {} is already {:?}", job_id, current)
    } else {
        format!("Job {} cannot {:?} from {:?}", job_id, expected, current)
    };
    Err(AppError::Conflict(message))
}

/// A running publish or unpublish. Dropping it without `succeed` counts as a failure.
#[derive(Debug)]
pub struct InFlight<'a> {
    tracker: &'a PublishTracker,
    job_id: i64,
    status: PublishStatus,
    finished: bool,
}

impl InFlight<'_> {
    pub fn succeed(mut self) -> PublishStatus {
        self.finished = true;
        self.tracker
            .finish(self.job_id, self.status, PublishEvent::Succeeded)
    }

    pub fn fail(mut self) -> PublishStatus {
        self.finished = true;
        self.tracker
            .finish(self.job_id, self.status, PublishEvent::Failed)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker
                .finish(self.job_id, self.status, PublishEvent::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(properties: serde_json::Value) -> CatchmentJob {
        serde_json::from_value(json!({
            "id": 7, "name": "North", "algorithm": "site-based", "status": "SUCCESS",
            "properties": properties
        }))
        .unwrap()
    }

    #[test]
    fn test_transitions() {
        use PublishEvent::*;
        use PublishStatus::*;

        assert_eq!(Publish.apply(Started), Publishing);
        assert_eq!(Publishing.apply(Succeeded), Unpublish);
        assert_eq!(Publishing.apply(Failed), Publish);
        assert_eq!(Unpublish.apply(Started), Unpublishing);
        assert_eq!(Unpublishing.apply(Succeeded), Publish);
        assert_eq!(Unpublishing.apply(Failed), Unpublish);
        assert_eq!(Publish.apply(Succeeded), Publish);
        assert_eq!(Publishing.apply(Started), Publishing);
    }

    #[test]
    fn test_resting_status_follows_attribute_id() {
        assert_eq!(PublishStatus::of(&job(json!(null))), PublishStatus::Publish);
        assert_eq!(
            PublishStatus::of(&job(json!([{"field": "attributeId", "value": "a1"}]))),
            PublishStatus::Unpublish
        );
    }

    #[test]
    fn test_second_begin_conflicts() {
        let tracker = PublishTracker::new();
        let j = job(json!(null));

        let flight = tracker.begin(&j, PublishStatus::Publish).unwrap();
        assert_eq!(tracker.status(&j), PublishStatus::Publishing);
        assert!(matches!(
            tracker.begin(&j, PublishStatus::Publish),
            Err(AppError::Conflict(_))
        ));

        assert_eq!(flight.succeed(), PublishStatus::Unpublish);
        // Nothing is held once the operation ends.
        assert_eq!(tracker.status(&j), PublishStatus::Publish);
    }

    #[test]
    fn test_wrong_direction_conflicts() {
        let tracker = PublishTracker::new();
        let published = job(json!([{"field": "attributeId", "value": "a1"}]));
        assert!(tracker.ensure(&published, PublishStatus::Publish).is_err());
        assert!(tracker.ensure(&published, PublishStatus::Unpublish).is_ok());
    }

    #[test]
    fn test_dropped_flight_counts_as_failure() {
        let tracker = PublishTracker::new();
        let j = job(json!(null));
        {
            let _flight = tracker.begin(&j, PublishStatus::Publish).unwrap();
        }
        assert_eq!(tracker.status(&j), PublishStatus::Publish);

        let flight = tracker.begin(&j, PublishStatus::Publish).unwrap();
        assert_eq!(flight.fail(), PublishStatus::Publish);
    }
}
