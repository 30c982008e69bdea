//! CSV roster of profiles to process.
//!
//! Expected header: `profile_id,proxy`. Rows with an empty `profile_id` are
//! skipped. A global override proxy, when given, wins over every per-row
//! proxy.
use roost_common::{Result, RoostError};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    profile_id: String,
    #[serde(default)]
    proxy: String,
}

/// One profile to process, with the proxy its browser should route through.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub profile: String,
    pub proxy: Option<String>,
}

/// Ordered list of profiles loaded from a roster CSV.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn from_csv_path(path: &Path, override_proxy: Option<&str>) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| RoostError::Roster(format!("cannot open {}: {e}", path.display())))?;
        let roster = Self::from_reader(reader, override_proxy)?;
        info!(
            profiles = roster.len(),
            path = %path.display(),
            "roster.loaded"
        );
        Ok(roster)
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        override_proxy: Option<&str>,
    ) -> Result<Self> {
        let override_proxy = override_proxy.map(str::trim).filter(|p| !p.is_empty());

        let mut entries = Vec::new();
        for row in reader.deserialize::<RosterRow>() {
            let row = row.map_err(|e| RoostError::Roster(format!("malformed row: {e}")))?;
            let profile = row.profile_id.trim();
            if profile.is_empty() {
                continue;
            }
            let proxy = match override_proxy {
                Some(p) => Some(p.to_string()),
                None => Some(row.proxy.trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            };
            entries.push(RosterEntry {
                profile: profile.to_string(),
                proxy,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&RosterEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a starter roster an operator can fill in.
    pub fn write_sample(path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| RoostError::Roster(format!("cannot create {}: {e}", path.display())))?;
        writer
            .write_record(["profile_id", "proxy"])
            .and_then(|_| writer.write_record(["profile1", "us1.example-proxy.net:8080"]))
            .and_then(|_| writer.write_record(["profile2", ""]))
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|e| RoostError::Roster(format!("cannot write sample roster: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_rows_and_skips_blank_profiles() {
        let f = write_csv(
            "profile_id,proxy\nalpha,10.0.0.1:8080\n  ,ignored:1\nbeta,\n gamma , 10.0.0.2:3128 \n",
        );
        let roster = Roster::from_csv_path(f.path(), None).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(
            roster.get(0),
            Some(&RosterEntry {
                profile: "alpha".into(),
                proxy: Some("10.0.0.1:8080".into()),
            })
        );
        assert_eq!(roster.get(1).unwrap().proxy, None);
        assert_eq!(roster.get(2).unwrap().profile, "gamma");
        assert_eq!(roster.get(2).unwrap().proxy, Some("10.0.0.2:3128".into()));
    }

    #[test]
    fn override_proxy_wins_over_row_proxy() {
        let f = write_csv("profile_id,proxy\nalpha,10.0.0.1:8080\nbeta,\n");
        let roster = Roster::from_csv_path(f.path(), Some("gw.corp:9999")).unwrap();
        assert!(roster
            .entries()
            .iter()
            .all(|e| e.proxy.as_deref() == Some("gw.corp:9999")));
    }

    #[test]
    fn blank_override_proxy_is_ignored() {
        let f = write_csv("profile_id,proxy\nalpha,10.0.0.1:8080\n");
        let roster = Roster::from_csv_path(f.path(), Some("   ")).unwrap();
        assert_eq!(roster.get(0).unwrap().proxy, Some("10.0.0.1:8080".into()));
    }

    #[test]
    fn missing_file_is_a_roster_error() {
        let err = Roster::from_csv_path(Path::new("/nonexistent/roster.csv"), None).unwrap_err();
        assert!(matches!(err, RoostError::Roster(_)));
    }

    #[test]
    fn sample_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_profiles.csv");
        Roster::write_sample(&path).unwrap();
        let roster = Roster::from_csv_path(&path, None).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(0).unwrap().profile, "profile1");
        assert_eq!(roster.get(1).unwrap().proxy, None);
    }
}
