//! Semantic phase: let the real `haproxy` binary judge the configuration.
//!
//! The configuration and all auxiliary files are materialized into the
//! resolved paths, then `haproxy -c -f <config>` runs and its stderr is
//! mined for `[ALERT]` lines. The binary misbehaves under concurrent
//! invocations, so the whole phase holds a process-wide lock.

use crate::constants;
use crate::error::{ValidationError, ValidationPhase};
use crate::files::{basename, AuxFile, AuxFiles};
use crate::version::ResolvedPaths;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

static SEMANTIC_LOCK: Mutex<()> = Mutex::const_new(());

fn file_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\[\]:]+):(\d+)\]").expect("alert location pattern is valid")
    })
}

fn semantic_error(message: impl Into<String>) -> ValidationError {
    ValidationError::new(ValidationPhase::Semantic, message)
}

/// Run the external check over materialized files
///
/// # Errors
/// A semantic [`ValidationError`]: binary not found, materialization
/// failure, or the check itself rejecting the configuration (with alert
/// context spliced in).
pub async fn check(
    config_text: &str,
    aux: &AuxFiles,
    paths: &ResolvedPaths,
) -> Result<(), ValidationError> {
    let _guard = SEMANTIC_LOCK.lock().await;

    let binary = which::which(constants::HAPROXY_BINARY).map_err(|cause| {
        semantic_error(format!(
            "'{}' binary not found on the search path",
            constants::HAPROXY_BINARY
        ))
        .with_cause(anyhow::Error::new(cause))
    })?;

    materialize(config_text, aux, paths)
        .await
        .map_err(|cause| {
            semantic_error("could not materialize configuration for validation").with_cause(cause)
        })?;

    let output = Command::new(&binary)
        .arg("-c")
        .arg("-f")
        .arg(&paths.config_file)
        .output()
        .await
        .map_err(|cause| {
            semantic_error(format!("failed to run {}", binary.display()))
                .with_cause(anyhow::Error::new(cause))
        })?;

    if output.status.success() {
        debug!("haproxy accepted the configuration");
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let report = extract_alerts(&stderr, config_text);
    Err(semantic_error(format!("haproxy validation failed: {report}")))
}

/// Write the configuration and every auxiliary file into the target layout
///
/// Each target directory is cleared first so stale files from a previous
/// check cannot mask a missing-file error; the config file is replaced.
async fn materialize(
    config_text: &str,
    aux: &AuxFiles,
    paths: &ResolvedPaths,
) -> anyhow::Result<()> {
    let groups: [(&PathBuf, &Vec<AuxFile>); 4] = [
        (&paths.maps_dir, &aux.maps),
        (&paths.ssl_dir, &aux.ssl_certificates),
        (&paths.general_dir, &aux.general),
        (&paths.crt_list_dir, &aux.crt_lists),
    ];

    // crt_list_dir aliases ssl_dir or general_dir, so dirs are cleared
    // once each before any file lands
    let unique_dirs: BTreeSet<&PathBuf> = groups.iter().map(|(dir, _)| *dir).collect();
    for dir in unique_dirs {
        reset_dir(dir).await?;
    }
    for (dir, files) in groups {
        for file in files {
            tokio::fs::write(dir.join(basename(&file.name)), &file.content).await?;
        }
    }

    if let Some(parent) = paths.config_file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&paths.config_file, config_text).await?;
    Ok(())
}

async fn reset_dir(dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// Extract `[ALERT]` blocks with surrounding stderr lines, splicing in
/// configuration context when the alert names a file and line
fn extract_alerts(stderr: &str, config_text: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let context = constants::ALERT_CONTEXT_LINES;
    let mut blocks = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if !line.contains("[ALERT]") {
            continue;
        }
        let start = index.saturating_sub(context);
        let end = (index + context).min(lines.len().saturating_sub(1));
        let mut block = lines[start..=end].join("\n");

        if let Some(caps) = file_line_re().captures(line) {
            if let Ok(line_no) = caps[2].parse::<usize>() {
                if let Some(snippet) = config_context(config_text, line_no, context) {
                    block.push_str("\n\n");
                    block.push_str(&snippet);
                }
            }
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        stderr.trim().to_string()
    } else {
        blocks.join("\n\n")
    }
}

/// Configuration lines around a 1-based line number, error line marked
fn config_context(config_text: &str, line_no: usize, context: usize) -> Option<String> {
    let lines: Vec<&str> = config_text.lines().collect();
    if line_no == 0 || line_no > lines.len() {
        return None;
    }
    let start = line_no.saturating_sub(context + 1);
    let end = (line_no + context - 1).min(lines.len() - 1);
    let mut out = Vec::new();
    for (offset, text) in lines[start..=end].iter().enumerate() {
        let current = start + offset + 1;
        let marker = if current == line_no { ">" } else { " " };
        out.push(format!("{marker} {current:4} | {text}"));
    }
    Some(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "global\n    maxconn 100\n\ndefaults\n    mode http\n\nbackend api\n    server s1 10.0.0.1:80\n    bogus directive\n";

    #[test]
    fn test_alert_block_with_config_context() {
        let stderr = "note: starting check\n[NOTICE] config path ok\n[ALERT]    (1) : config : parsing [/etc/haproxy/haproxy.cfg:9] : unknown keyword 'bogus'\n[ALERT]    (1) : config : fatal errors found\nexit\n";
        let report = extract_alerts(stderr, CONFIG);
        assert!(report.contains("unknown keyword 'bogus'"));
        // The offending config line is marked
        assert!(report.contains(">    9 | "));
        assert!(report.contains("bogus directive"));
        // Surrounding config lines come along
        assert!(report.contains("server s1 10.0.0.1:80"));
    }

    #[test]
    fn test_no_alert_passes_stderr_through() {
        let stderr = "some opaque failure\n";
        assert_eq!(extract_alerts(stderr, CONFIG), "some opaque failure");
    }

    #[test]
    fn test_alert_without_location_keeps_block_only() {
        let stderr = "[ALERT]    (1) : config : fatal errors found\n";
        let report = extract_alerts(stderr, CONFIG);
        assert!(report.contains("fatal errors found"));
        assert!(!report.contains(" | "));
    }

    #[test]
    fn test_config_context_bounds() {
        assert!(config_context(CONFIG, 0, 3).is_none());
        assert!(config_context(CONFIG, 999, 3).is_none());
        let first = config_context(CONFIG, 1, 3).unwrap();
        assert!(first.starts_with(">    1 | global"));
    }
}
