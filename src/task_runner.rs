// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Executes one build or judge task in an already-running sandbox,
//! classifies the result, and persists its captured output.

use std::path::Path;
use std::time::Duration;

use bollard::Docker;

use crate::docker::exec::{self, ExecConfig};
use crate::error::JudgeError;
use crate::matcher;
use crate::model::{JobDetail, ResultLog, Task};
use crate::status::Status;
use crate::watchdog::{WatchdogInput, WatchdogOutput};

/// Which stage a task belongs to. The exit-code classification rule and the
/// fatality of a nonzero watchdog-wrapper exit code both depend on this.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Build,
    Judge,
}

impl Stage {
    fn capture_prefix(self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Judge => "judge",
        }
    }
}

/// Runs `task` to completion inside `container_id` and returns its
/// `ResultLog`. Any error here is fatal to the remainder of the stage; the
/// caller is responsible for appending an `IE` placeholder for this task
/// when that happens (see `job_executor`).
pub async fn run_task(
    docker: &Docker,
    container_id: &str,
    upload_root: &Path,
    result_dir: &str,
    job: &JobDetail,
    stage: Stage,
    task: &Task,
) -> Result<ResultLog, JudgeError> {
    let stdin_content = tokio::fs::read_to_string(upload_root.join(&task.stdin_path))
        .await
        .map_err(|e| {
            JudgeError::Io(format!(
                "failed to read stdin file {}: {e}",
                task.stdin_path
            ))
        })?;

    let expected_stdout = read_expected(upload_root, stage, &task.stdout_path).await?;
    let expected_stderr = read_expected(upload_root, stage, &task.stderr_path).await?;

    let watchdog_input =
        WatchdogInput::new(task.command.clone(), stdin_content, job.time_ms, job.memory_mb);
    let watchdog_stdin = serde_json::to_string(&watchdog_input)?;

    let timeout = Duration::from_secs(job.time_ms / 1000 + 5);
    let exec_result = exec::exec(
        docker,
        container_id,
        ExecConfig {
            cmd: vec!["/home/watchdog".to_string()],
            stdin: watchdog_stdin,
            working_dir: "/home/guest".to_string(),
            user: "root".to_string(),
            timeout,
        },
    )
    .await?;

    // Build-stage-only: a nonzero exit from the watchdog wrapper itself is
    // fatal. In the judge stage it is not — the watchdog's own report
    // governs classification.
    if stage == Stage::Build && exec_result.exit_code != 0 {
        return Err(JudgeError::Protocol(format!(
            "watchdog wrapper exited with code {} in build stage, stderr: {}",
            exec_result.exit_code,
            String::from_utf8_lossy(&exec_result.stderr)
        )));
    }

    if !exec_result.stderr.is_empty() {
        return Err(JudgeError::Protocol(format!(
            "watchdog wrote to its own stderr: {}",
            String::from_utf8_lossy(&exec_result.stderr)
        )));
    }

    let watchdog_output: WatchdogOutput = serde_json::from_slice(&exec_result.stdout)?;

    let stdout_rel = format!("{}/{}_{}_stdout.txt", result_dir, stage.capture_prefix(), task.id);
    let stderr_rel = format!("{}/{}_{}_stderr.txt", result_dir, stage.capture_prefix(), task.id);
    tokio::fs::write(upload_root.join(&stdout_rel), &watchdog_output.stdout)
        .await
        .map_err(|e| JudgeError::Io(format!("failed to write {stdout_rel}: {e}")))?;
    tokio::fs::write(upload_root.join(&stderr_rel), &watchdog_output.stderr)
        .await
        .map_err(|e| JudgeError::Io(format!("failed to write {stderr_rel}: {e}")))?;

    let actual_exit_code = watchdog_output.exit_code.ok_or_else(|| {
        JudgeError::Protocol("watchdog terminated abnormally; no exit code reported".to_string())
    })?;

    let status = classify(
        stage,
        task,
        actual_exit_code,
        &watchdog_output,
        expected_stdout.as_deref(),
        expected_stderr.as_deref(),
    );

    if status != Status::AC {
        log::warn!(
            "task {} (`{}`) in {:?} stage classified as {status}",
            task.id,
            task.title,
            stage
        );
    }

    Ok(ResultLog {
        test_case_id: task.id,
        result_id: status,
        // The watchdog's configured budget, not its measured runtime — a
        // known quirk of the wire contract.
        time_ms: job.time_ms,
        memory_kb: watchdog_output.memory_kb,
        exit_code: actual_exit_code,
        stdout_path: stdout_rel,
        stderr_path: stderr_rel,
    })
}

async fn read_expected(
    upload_root: &Path,
    stage: Stage,
    path: &str,
) -> Result<Option<String>, JudgeError> {
    if stage != Stage::Judge || path.is_empty() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(upload_root.join(path))
        .await
        .map_err(|e| JudgeError::Io(format!("failed to read expected file {path}: {e}")))?;
    Ok(Some(content))
}

fn classify(
    stage: Stage,
    task: &Task,
    actual_exit_code: i32,
    watchdog_output: &WatchdogOutput,
    expected_stdout: Option<&str>,
    expected_stderr: Option<&str>,
) -> Status {
    let mut status = Status::AC;

    if watchdog_output.ole {
        status = status.max(Status::OLE);
    }
    if watchdog_output.mle {
        status = status.max(Status::MLE);
    }
    if watchdog_output.tle {
        status = status.max(Status::TLE);
    }

    match stage {
        Stage::Build => {
            if task.exit_code == 0 && actual_exit_code != 0 {
                status = status.max(Status::CE);
            } else if task.exit_code != 0 && actual_exit_code != task.exit_code {
                status = status.max(Status::RE);
            }
        }
        Stage::Judge => {
            if task.exit_code == 0 && actual_exit_code != 0 {
                status = status.max(Status::RE);
            } else if task.exit_code != 0 && actual_exit_code != task.exit_code {
                status = status.max(Status::WA);
            }

            if let Some(expected) = expected_stdout {
                if !matcher::matches(expected, &watchdog_output.stdout) {
                    status = status.max(Status::WA);
                }
            }
            if let Some(expected) = expected_stderr {
                if !matcher::matches(expected, &watchdog_output.stderr) {
                    status = status.max(Status::WA);
                }
            }
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(exit_code: i32) -> Task {
        Task {
            id: 1,
            title: "t".to_string(),
            command: vec!["./a.out".to_string()],
            stdin_path: "in.txt".to_string(),
            stdout_path: String::new(),
            stderr_path: String::new(),
            exit_code,
        }
    }

    fn output(exit_code: Option<i32>, tle: bool, mle: bool, ole: bool) -> WatchdogOutput {
        WatchdogOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code,
            memory_kb: 0,
            time_ms: 0,
            tle,
            mle,
            ole,
        }
    }

    #[test]
    fn build_stage_unexpected_nonzero_exit_is_compile_error() {
        let t = task(0);
        let out = output(Some(1), false, false, false);
        assert_eq!(classify(Stage::Build, &t, 1, &out, None, None), Status::CE);
    }

    #[test]
    fn build_stage_expected_nonzero_but_different_is_runtime_error() {
        let t = task(2);
        let out = output(Some(3), false, false, false);
        assert_eq!(classify(Stage::Build, &t, 3, &out, None, None), Status::RE);
    }

    #[test]
    fn judge_stage_unexpected_nonzero_exit_is_runtime_error() {
        let t = task(0);
        let out = output(Some(1), false, false, false);
        assert_eq!(classify(Stage::Judge, &t, 1, &out, None, None), Status::RE);
    }

    #[test]
    fn judge_stage_expected_nonzero_but_different_is_wrong_answer() {
        let t = task(2);
        let out = output(Some(3), false, false, false);
        assert_eq!(classify(Stage::Judge, &t, 3, &out, None, None), Status::WA);
    }

    #[test]
    fn judge_stage_output_mismatch_is_wrong_answer() {
        let t = task(0);
        let mut out = output(Some(0), false, false, false);
        out.stdout = "42\n".to_string();
        assert_eq!(
            classify(Stage::Judge, &t, 0, &out, Some("43\n"), None),
            Status::WA
        );
    }

    #[test]
    fn tle_outranks_a_nonzero_exit_code() {
        let t = task(0);
        let out = output(Some(137), true, false, false);
        assert_eq!(classify(Stage::Judge, &t, 137, &out, None, None), Status::TLE);
    }

    #[test]
    fn mle_outranks_a_nonzero_exit_code() {
        let t = task(0);
        let out = output(Some(9), false, true, false);
        assert_eq!(classify(Stage::Judge, &t, 9, &out, None, None), Status::MLE);
    }

    #[test]
    fn happy_path_is_accepted() {
        let t = task(0);
        let mut out = output(Some(0), false, false, false);
        out.stdout = "Hello, World!\n".to_string();
        assert_eq!(
            classify(Stage::Judge, &t, 0, &out, Some("Hello, World!\n"), None),
            Status::AC
        );
    }
}
