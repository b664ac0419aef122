//! Speed test collector: wraps an external speed test command.
//!
//! The measurement itself is delegated to the Ookla `speedtest` CLI (or
//! a compatible command configured by the user) and its JSON output is
//! reduced to the three figures the stream carries.

use serde::Serialize;
use tokio::process::Command;

use crate::error::CollectorError;

/// Result of one speed test run. Bandwidth figures are bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedTestResult {
    pub ping_ms: f64,
    pub download_bps: f64,
    pub upload_bps: f64,
    /// Unix timestamp of the run.
    pub timestamp: i64,
}

/// Runs the configured speed test command and parses its JSON output.
pub async fn run(command: &str) -> Result<SpeedTestResult, CollectorError> {
    let output = Command::new(command)
        .args(["--accept-license", "--accept-gdpr", "--format=json"])
        .output()
        .await
        .map_err(|e| CollectorError::SpeedTest(format!("failed to run {}: {}", command, e)))?;

    if !output.status.success() {
        return Err(CollectorError::SpeedTest(format!(
            "{} exited with {}: {}",
            command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the Ookla CLI JSON format: `ping.latency` in milliseconds,
/// `download.bandwidth`/`upload.bandwidth` in bytes per second.
fn parse_output(stdout: &str) -> Result<SpeedTestResult, CollectorError> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| CollectorError::SpeedTest(format!("invalid JSON output: {}", e)))?;

    let ping_ms = value["ping"]["latency"]
        .as_f64()
        .ok_or_else(|| CollectorError::SpeedTest("missing ping.latency".to_string()))?;
    let download = value["download"]["bandwidth"]
        .as_f64()
        .ok_or_else(|| CollectorError::SpeedTest("missing download.bandwidth".to_string()))?;
    let upload = value["upload"]["bandwidth"]
        .as_f64()
        .ok_or_else(|| CollectorError::SpeedTest("missing upload.bandwidth".to_string()))?;

    Ok(SpeedTestResult {
        ping_ms,
        download_bps: download * 8.0,
        upload_bps: upload * 8.0,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ookla_output() {
        let stdout = r#"{
            "type": "result",
            "ping": {"jitter": 0.4, "latency": 12.5},
            "download": {"bandwidth": 12500000, "bytes": 100000000},
            "upload": {"bandwidth": 2500000, "bytes": 20000000}
        }"#;

        let result = parse_output(stdout).expect("parsed");
        assert_eq!(result.ping_ms, 12.5);
        assert_eq!(result.download_bps, 100_000_000.0);
        assert_eq!(result.upload_bps, 20_000_000.0);
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let result = parse_output(r#"{"ping": {"latency": 1.0}}"#);
        assert!(matches!(result, Err(CollectorError::SpeedTest(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = parse_output("Speedtest by Ookla\n");
        assert!(matches!(result, Err(CollectorError::SpeedTest(_))));
    }
}
