//! Stray Chrome process cleanup.
//!
//! A browser left behind by a failed launch keeps an exclusive lock on its
//! `--user-data-dir` and blocks the next launch of the same profile. Before
//! each launch we kill any Chrome process whose command line points into our
//! profiles directory.
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Kill Chrome processes whose command line references `profiles_dir`.
/// Returns the number of processes killed.
pub fn kill_stray_browsers(profiles_dir: &Path) -> u32 {
    let marker = profiles_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| profiles_dir.to_string_lossy().into_owned());

    #[cfg(target_os = "windows")]
    {
        kill_stray_browsers_windows(&marker)
    }

    #[cfg(not(target_os = "windows"))]
    {
        kill_stray_browsers_unix(&marker)
    }
}

#[cfg(not(target_os = "windows"))]
fn kill_stray_browsers_unix(marker: &str) -> u32 {
    let output = match Command::new("ps").args(["aux"]).output() {
        Ok(o) => o,
        Err(e) => {
            debug!(error = %e, "process.enumerate_failed");
            return 0;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut killed = 0u32;

    for line in stdout.lines() {
        if !line.contains(marker) || !line.to_lowercase().contains("chrom") {
            continue;
        }
        if let Some(pid) = extract_pid_unix(line) {
            info!(pid, "process.killing_stray");
            let _ = Command::new("kill").args(["-9", &pid.to_string()]).output();
            killed += 1;
        }
    }

    if killed > 0 {
        info!(killed, "process.strays_cleaned");
    }
    killed
}

#[cfg(target_os = "windows")]
fn kill_stray_browsers_windows(marker: &str) -> u32 {
    let output = match Command::new("wmic")
        .args([
            "process",
            "where",
            "Name='chrome.exe'",
            "get",
            "ProcessId,CommandLine",
            "/FORMAT:CSV",
        ])
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            debug!(error = %e, "process.enumerate_failed");
            return 0;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut killed = 0u32;

    for line in stdout.lines() {
        if !line.contains(marker) {
            continue;
        }
        if let Some(pid) = extract_pid_csv(line) {
            info!(pid, "process.killing_stray");
            let _ = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .output();
            killed += 1;
        }
    }

    if killed > 0 {
        info!(killed, "process.strays_cleaned");
    }
    killed
}

/// PID is the second field of `ps aux` output.
fn extract_pid_unix(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1).and_then(|s| s.parse().ok())
}

/// WMIC CSV format is `Node,CommandLine,ProcessId`; the PID is the last
/// numeric field.
#[allow(dead_code)]
fn extract_pid_csv(line: &str) -> Option<u32> {
    line.split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_from_ps_aux_line() {
        let line = "user     23145  2.3  1.1 123456 78901 ?  Sl  10:02  0:07 /usr/bin/chromium --user-data-dir=/home/user/browser_profiles/acct-1";
        assert_eq!(extract_pid_unix(line), Some(23145));
    }

    #[test]
    fn pid_missing_from_short_line() {
        assert_eq!(extract_pid_unix("chrome"), None);
    }

    #[test]
    fn pid_from_wmic_csv_line() {
        let line = "NODE,\"chrome.exe --user-data-dir=C:\\browser_profiles\\acct-1\",4321";
        assert_eq!(extract_pid_csv(line), Some(4321));
    }
}
