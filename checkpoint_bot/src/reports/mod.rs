mod lifecycle;
mod store;
mod types;

pub use store::ReportStore;
pub use types::*;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Errors of operations on reports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither usable coordinates nor any address text. Nothing was created.
    #[error("location has neither valid coordinates nor address text")]
    InvalidLocation,
    /// No report with this ID. It either expired, was voted away, or never existed.
    #[error("report {0} is not tracked")]
    NotFound(ReportId),
    /// The change could not be saved, and was undone.
    #[error("failed to save reports: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Keeper of all reports.
///
/// Telegram updates are handled concurrently, so every change to the
/// store goes through a single lock, and is saved while still holding it.
pub struct Tracker {
    store: Mutex<ReportStore>,
    gone_threshold: u32,
    lifetime_minutes: u32,
}

impl Tracker {
    pub fn new(store: ReportStore, gone_threshold: u32, lifetime_minutes: u32) -> Tracker {
        Tracker {
            store: Mutex::new(store),
            gone_threshold,
            lifetime_minutes,
        }
    }

    /// How many "gone" votes remove a report.
    pub fn gone_threshold(&self) -> u32 {
        self.gone_threshold
    }

    /// Create a new report, expiring after the configured lifetime.
    pub async fn create_report(
        &self,
        description: Option<&str>,
        location: Location,
    ) -> Result<Report, Error> {
        let report = self.store.lock().await.create_report_at(
            description,
            location,
            self.lifetime_minutes,
            Utc::now(),
        )?;

        log::info!(
            "New report {}: {} at {}",
            report.id(),
            report.description(),
            report.location()
        );
        Ok(report)
    }

    pub async fn confirm(&self, id: ReportId) -> Result<Report, Error> {
        self.store.lock().await.confirm(id)
    }

    pub async fn retract(&self, id: ReportId) -> Result<RetractResult, Error> {
        let result = self.store.lock().await.retract(id, self.gone_threshold)?;

        if result.removed {
            log::info!("Report {} was voted away.", id);
        }
        Ok(result)
    }

    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ReportId>, Error> {
        let removed = self.store.lock().await.sweep_expired(now)?;

        if !removed.is_empty() {
            log::info!("Expired {} reports: {:?}", removed.len(), removed);
        }
        Ok(removed)
    }

    pub async fn get(&self, id: ReportId) -> Option<Report> {
        self.store.lock().await.get(id).cloned()
    }

    pub async fn report_count(&self) -> usize {
        self.store.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;

    fn tracker(dir: &tempfile::TempDir, lifetime_minutes: u32) -> Tracker {
        Tracker::new(
            ReportStore::load(dir.path().join("points.json")),
            3,
            lifetime_minutes,
        )
    }

    #[tokio::test]
    async fn retract_until_gone() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir, 30);

        let report = tracker
            .create_report(None, Location::address("Lenina 5"))
            .await
            .unwrap();
        let id = report.id();

        assert!(!tracker.retract(id).await.unwrap().removed);
        assert!(!tracker.retract(id).await.unwrap().removed);
        let last = tracker.retract(id).await.unwrap();
        assert!(last.removed);
        assert_eq!(last.report.retract_count(), 3);
        assert!(matches!(tracker.retract(id).await, Err(Error::NotFound(_))));
        assert!(tracker.get(id).await.is_none());
    }

    #[tokio::test]
    async fn zero_lifetime_is_swept() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir, 0);

        let report = tracker
            .create_report(Some("one car"), Location::coordinates(55.75, 37.61))
            .await
            .unwrap();

        let removed = tracker
            .sweep_expired(Utc::now() + TimeDelta::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, vec![report.id()]);
        assert_eq!(tracker.report_count().await, 0);
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir, 30);

        let result = tracker.create_report(Some(""), Location::address("")).await;
        assert!(matches!(result, Err(Error::InvalidLocation)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(tracker(&dir, 30));

        let id = tracker
            .create_report(None, Location::address("Lenina 5"))
            .await
            .unwrap()
            .id();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.confirm(id).await.map(|_| ()) })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(tracker.get(id).await.unwrap().confirm_count(), 21);
        let on_disk = ReportStore::load(dir.path().join("points.json"));
        assert_eq!(on_disk.get(id).unwrap().confirm_count(), 21);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(tracker(&dir, 30));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    tracker
                        .create_report(None, Location::address(format!("street {i}")))
                        .await
                        .map(|report| report.id())
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
