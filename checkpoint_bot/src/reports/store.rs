use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use super::{PersistenceError, Report, ReportId};

/// All currently tracked reports, mirrored to a JSON file.
///
/// The file holds a plain array of reports ordered by ID. Next to it lives
/// `<file>.last_id` with the highest ID ever handed out, so IDs of removed
/// reports don't get reused after a restart.
pub struct ReportStore {
    path: PathBuf,
    reports: BTreeMap<ReportId, Report>,
    last_id: u64,
}

impl ReportStore {
    /// Load reports from the file at `path`.
    ///
    /// Never fails. If the file is missing or can't be parsed, this starts
    /// with no reports, and the file will be overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> ReportStore {
        let path = path.into();

        let reports = match read_reports(&path) {
            Ok(list) => {
                let mut reports = BTreeMap::new();
                for report in list {
                    if let Some(old) = reports.insert(report.id, report) {
                        log::warn!("Duplicate report ID {} in {}", old.id, path.display());
                    }
                }
                reports
            }
            Err(PersistenceError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::info!("No reports file at {}, starting fresh.", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                log::warn!(
                    "Failed to read reports from {}, starting fresh: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        let last_id_on_disk = match fs::read_to_string(last_id_path(&path)) {
            Ok(s) => s.trim().parse::<u64>().unwrap_or_else(|e| {
                log::warn!("Garbage in last ID file, ignoring it: {}", e);
                0
            }),
            Err(_) => 0,
        };

        let max_id = reports.keys().next_back().map_or(0, |id| id.0);

        ReportStore {
            path,
            reports,
            last_id: last_id_on_disk.max(max_id),
        }
    }

    /// Overwrite the file with the current reports.
    ///
    /// # Errors
    /// Errors if serializing or writing fails. The file is replaced
    /// atomically and only as the very last step, so on error the previous
    /// contents stay intact.
    pub fn save(&self) -> Result<(), PersistenceError> {
        let list: Vec<&Report> = self.reports.values().collect();
        let data = serde_json::to_vec_pretty(&list)?;

        // The data file goes last, so a failed save never leaves it changed.
        // A last ID running ahead of the data is harmless.
        write_atomically(&last_id_path(&self.path), self.last_id.to_string().as_bytes())?;
        write_atomically(&self.path, &data)?;

        log::debug!("Saved {} reports to {}", list.len(), self.path.display());
        Ok(())
    }

    /// Hand out a fresh ID.
    ///
    /// IDs only ever go up, so an ID that was used once is never seen again,
    /// even after its report is removed.
    pub fn next_id(&mut self) -> ReportId {
        self.last_id += 1;
        ReportId(self.last_id)
    }

    pub fn get(&self, id: ReportId) -> Option<&Report> {
        self.reports.get(&id)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// All reports, ordered by ID.
    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn get_mut(&mut self, id: ReportId) -> Option<&mut Report> {
        self.reports.get_mut(&id)
    }

    pub(super) fn insert(&mut self, report: Report) {
        self.reports.insert(report.id, report);
    }

    pub(super) fn remove(&mut self, id: ReportId) -> Option<Report> {
        self.reports.remove(&id)
    }
}

fn read_reports(path: &Path) -> Result<Vec<Report>, PersistenceError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

fn last_id_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".last_id");
    PathBuf::from(name)
}

/// Write to a temporary file next to `path`, then move it over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
