// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The wire format exchanged with `/home/watchdog`, the in-container
//! supervisor. We only specify its contract; the binary itself is out of
//! scope. Field names are `PascalCase` to match the watchdog's own JSON,
//! which this worker does not control.

use serde::{Deserialize, Serialize};

pub const GUEST_UID: u32 = 1002;
pub const GUEST_GID: u32 = 1002;
pub const STDOUT_MAX_BYTES: u64 = 2 * 1024;
pub const STDERR_MAX_BYTES: u64 = 2 * 1024;

/// Written to the watchdog's stdin.
#[derive(Clone, Debug, Serialize)]
pub struct WatchdogInput {
    #[serde(rename = "Command")]
    pub command: Vec<String>,
    #[serde(rename = "Stdin")]
    pub stdin: String,
    #[serde(rename = "TimeoutMS")]
    pub timeout_ms: u64,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u64,
    #[serde(rename = "UID")]
    pub uid: u32,
    #[serde(rename = "GID")]
    pub gid: u32,
    #[serde(rename = "StdoutMaxBytes")]
    pub stdout_max_bytes: u64,
    #[serde(rename = "StderrMaxBytes")]
    pub stderr_max_bytes: u64,
}

impl WatchdogInput {
    pub fn new(command: Vec<String>, stdin: String, timeout_ms: u64, memory_mb: u64) -> Self {
        WatchdogInput {
            command,
            stdin,
            timeout_ms,
            memory_mb,
            uid: GUEST_UID,
            gid: GUEST_GID,
            stdout_max_bytes: STDOUT_MAX_BYTES,
            stderr_max_bytes: STDERR_MAX_BYTES,
        }
    }
}

/// Parsed from the watchdog's stdout. `exit_code: None` means the watchdog
/// could not observe the child's termination status — treated as `IE` by
/// the task runner. Unknown fields are ignored, per the parser contract.
#[derive(Clone, Debug, Deserialize)]
pub struct WatchdogOutput {
    #[serde(rename = "Stdout")]
    pub stdout: String,
    #[serde(rename = "Stderr")]
    pub stderr: String,
    #[serde(rename = "ExitCode")]
    pub exit_code: Option<i32>,
    #[serde(rename = "MemoryKB")]
    pub memory_kb: u64,
    #[serde(rename = "TimeMS")]
    pub time_ms: u64,
    #[serde(rename = "TLE")]
    pub tle: bool,
    #[serde(rename = "MLE")]
    pub mle: bool,
    #[serde(rename = "OLE")]
    pub ole: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_serialises_with_pascal_case_keys() {
        let input = WatchdogInput::new(vec!["./a.out".to_string()], "\n".to_string(), 1000, 256);
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["Command"][0], "./a.out");
        assert_eq!(json["UID"], 1002);
        assert_eq!(json["StdoutMaxBytes"], 2048);
    }

    #[test]
    fn output_parses_null_exit_code_as_none() {
        let json = r#"{"Stdout":"","Stderr":"oom","ExitCode":null,"MemoryKB":300000,"TimeMS":900,"TLE":false,"MLE":true,"OLE":false}"#;
        let output: WatchdogOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.exit_code, None);
        assert!(output.mle);
    }

    #[test]
    fn output_ignores_unknown_fields() {
        let json = r#"{"Stdout":"hi","Stderr":"","ExitCode":0,"MemoryKB":100,"TimeMS":5,
            "TLE":false,"MLE":false,"OLE":false,"Extra":"field","AnotherOne":42}"#;
        let output: WatchdogOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.stdout, "hi");
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn output_round_trips_valid_json_fields() {
        let json = r#"{"Stdout":"Hello, World!\n","Stderr":"","ExitCode":0,
            "MemoryKB":1024,"TimeMS":12,"TLE":false,"MLE":false,"OLE":false}"#;
        let output: WatchdogOutput = serde_json::from_str(json).unwrap();
        assert_eq!(output.stdout, "Hello, World!\n");
        assert_eq!(output.memory_kb, 1024);
        assert_eq!(output.time_ms, 12);
        assert!(!output.tle && !output.mle && !output.ole);
    }
}
