//! Creating, voting on and expiring reports.
//!
//! Every operation here saves the store before returning. If saving fails,
//! the in-memory change is undone so memory never runs ahead of the file.

use chrono::{DateTime, TimeDelta, Utc};

use super::{Error, Location, Report, ReportId, ReportStore, RetractResult, DEFAULT_DESCRIPTION};

impl ReportStore {
    /// Add a new report that expires `lifetime_minutes` after `now`.
    ///
    /// A missing or blank `description` is replaced with [`DEFAULT_DESCRIPTION`].
    ///
    /// # Errors
    /// [`Error::InvalidLocation`] if the location is unusable, or
    /// [`Error::Persistence`] if saving failed.
    pub fn create_report_at(
        &mut self,
        description: Option<&str>,
        location: Location,
        lifetime_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Report, Error> {
        if !location.is_valid() {
            return Err(Error::InvalidLocation);
        }

        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();

        let report = Report {
            id: self.next_id(),
            description,
            location,
            confirm_count: 1,
            retract_count: 0,
            expires_at: now + TimeDelta::minutes(lifetime_minutes.into()),
        };

        self.insert(report.clone());

        if let Err(e) = self.save() {
            self.remove(report.id);
            return Err(e.into());
        }

        Ok(report)
    }

    /// Count a "still there" vote.
    ///
    /// # Errors
    /// [`Error::NotFound`] if there's no such report, or
    /// [`Error::Persistence`] if saving failed.
    pub fn confirm(&mut self, id: ReportId) -> Result<Report, Error> {
        let report = self.get_mut(id).ok_or(Error::NotFound(id))?;
        report.confirm_count += 1;
        let updated = report.clone();

        if let Err(e) = self.save() {
            if let Some(report) = self.get_mut(id) {
                report.confirm_count -= 1;
            }
            return Err(e.into());
        }

        Ok(updated)
    }

    /// Count a "gone" vote. Once `gone_threshold` of those are in,
    /// the report is removed.
    ///
    /// # Errors
    /// [`Error::NotFound`] if there's no such report, or
    /// [`Error::Persistence`] if saving failed.
    pub fn retract(&mut self, id: ReportId, gone_threshold: u32) -> Result<RetractResult, Error> {
        let report = self.get_mut(id).ok_or(Error::NotFound(id))?;
        report.retract_count += 1;
        let updated = report.clone();

        let removed = updated.retract_count >= gone_threshold;
        if removed {
            self.remove(id);
        }

        if let Err(e) = self.save() {
            let mut restored = updated;
            restored.retract_count -= 1;
            self.insert(restored);
            return Err(e.into());
        }

        Ok(RetractResult {
            removed,
            report: updated,
        })
    }

    /// Remove every report that expired at or before `now`.
    ///
    /// Only saves if something was actually removed. Returns IDs of removed reports.
    ///
    /// # Errors
    /// [`Error::Persistence`] if saving failed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<ReportId>, Error> {
        let expired: Vec<ReportId> = self
            .iter()
            .filter(|report| report.expires_at <= now)
            .map(Report::id)
            .collect();

        if expired.is_empty() {
            return Ok(expired);
        }

        let removed: Vec<Report> = expired.iter().filter_map(|id| self.remove(*id)).collect();

        if let Err(e) = self.save() {
            for report in removed {
                self.insert(report);
            }
            return Err(e.into());
        }

        Ok(expired)
    }
}
