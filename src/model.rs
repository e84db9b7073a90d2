// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The job description handed to the executor, and the verdict handed back.

use serde::{Deserialize, Serialize};

use crate::status::Status;

/// A submission plus a declarative description of its build and judge tasks.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JobDetail {
    /// Relative path, under the host upload root, containing the submission tree.
    pub file_dir: String,
    /// Relative path, under the host upload root, to write per-task captures into.
    pub result_dir: String,
    /// Relative paths, under the host upload root, staged into the sandbox before build.
    pub test_files: Vec<String>,
    pub build_tasks: Vec<Task>,
    pub judge_tasks: Vec<Task>,
    /// Per-task wall-time budget, enforced by the watchdog.
    pub time_ms: u64,
    /// Per-task memory budget, enforced by the watchdog and the container cgroup.
    pub memory_mb: u64,
}

/// One command to run inside a sandbox, with expectations about its outcome.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Task {
    /// Unique within the stage it belongs to.
    pub id: u32,
    pub title: String,
    pub command: Vec<String>,
    /// Relative path, under the host upload root, to feed as stdin.
    pub stdin_path: String,
    /// Relative path to the expected stdout; empty means "do not compare".
    #[serde(default)]
    pub stdout_path: String,
    /// Relative path to the expected stderr; empty means "do not compare".
    #[serde(default)]
    pub stderr_path: String,
    pub exit_code: i32,
}

/// One executed task's outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultLog {
    pub test_case_id: u32,
    pub result_id: Status,
    pub time_ms: u64,
    pub memory_kb: u64,
    pub exit_code: i32,
    #[serde(default)]
    pub stdout_path: String,
    #[serde(default)]
    pub stderr_path: String,
}

impl ResultLog {
    /// A placeholder entry for a task that failed before classification could
    /// run: `result_id = IE`, `exit_code = -1`, per the internal-error contract.
    pub fn internal_error(task_id: u32) -> Self {
        ResultLog {
            test_case_id: task_id,
            result_id: Status::IE,
            time_ms: 0,
            memory_kb: 0,
            exit_code: -1,
            stdout_path: String::new(),
            stderr_path: String::new(),
        }
    }
}

/// The aggregate verdict for a job: build log followed by judge log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDetail {
    pub build_log: Vec<ResultLog>,
    pub judge_log: Vec<ResultLog>,
}

impl ResultDetail {
    pub fn from_logs(build_log: Vec<ResultLog>, judge_log: Option<Vec<ResultLog>>) -> Self {
        ResultDetail {
            build_log,
            judge_log: judge_log.unwrap_or_default(),
        }
    }
}
