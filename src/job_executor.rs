// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The per-job lifecycle: provision a volume, run the build stage in a
//! throwaway container, then (if it succeeded) the judge stage in a second
//! container bound to the same volume, and guarantee teardown on every exit
//! path.

use uuid::Uuid;

use crate::config::Config;
use crate::docker::{ContainerDriver, SandboxRole};
use crate::error::JudgeError;
use crate::model::{JobDetail, ResultDetail, ResultLog};
use crate::tar_pack;
use crate::task_runner::{self, Stage};

/// The outcome of a job: a `ResultDetail` that is always populated up to the
/// point of failure, plus the error (if any) that ended the job early.
pub struct JobOutcome {
    pub result: ResultDetail,
    pub error: Option<JudgeError>,
}

/// Runs `job` to completion. Never leaves a container or volume behind: every
/// resource created here is torn down before this function returns,
/// regardless of whether the job succeeded, failed, or was only partially
/// executed.
pub async fn execute_job(
    driver: &ContainerDriver,
    config: &Config,
    job: &JobDetail,
) -> JobOutcome {
    let job_id = Uuid::new_v4();
    let volume_name = ContainerDriver::volume_name(&job_id);

    if let Err(err) = driver.volume_create(&volume_name).await {
        return JobOutcome {
            result: ResultDetail::default(),
            error: Some(err),
        };
    }
    log::debug!("created volume `{volume_name}` for job {job_id}");

    let (build_log, build_error) =
        run_build_stage(driver, config, job, &volume_name, &job_id).await;

    let outcome = if build_error.is_some() || has_fatal_build_status(&build_log) {
        JobOutcome {
            result: ResultDetail::from_logs(build_log, None),
            error: build_error,
        }
    } else {
        let (judge_log, judge_error) =
            run_judge_stage(driver, config, job, &volume_name, &job_id).await;
        JobOutcome {
            result: ResultDetail::from_logs(build_log, Some(judge_log)),
            error: judge_error,
        }
    };

    if let Err(err) = driver.volume_remove(&volume_name).await {
        log::warn!("failed to remove volume `{volume_name}` during job cleanup: {err}");
    }

    outcome
}

/// The judge stage is skipped whenever the build log contains an entry that
/// is `IE`, `CE`, `TLE`, `MLE`, or `OLE` — i.e. anything other than a clean
/// `AC`/`WA`/`RE` pass. In practice the build stage only ever produces `AC`
/// or one of these fatal statuses, since `WA`/`RE` require a judge-only
/// classification rule, but we check generally rather than special-case
/// `CE`.
fn has_fatal_build_status(build_log: &[ResultLog]) -> bool {
    use crate::status::Status;
    build_log.iter().any(|entry| {
        matches!(
            entry.result_id,
            Status::IE | Status::CE | Status::TLE | Status::MLE | Status::OLE
        )
    })
}

async fn run_build_stage(
    driver: &ContainerDriver,
    config: &Config,
    job: &JobDetail,
    volume_name: &str,
    job_id: &Uuid,
) -> (Vec<ResultLog>, Option<JudgeError>) {
    let container_name = ContainerDriver::sandbox_name(SandboxRole::Build, job_id);
    let image = ContainerDriver::image_for(SandboxRole::Build, config);

    let container_id = match driver
        .container_create(config, &container_name, &image, volume_name, job.memory_mb)
        .await
    {
        Ok(id) => id,
        Err(err) => return (Vec::new(), Some(err)),
    };

    let outcome = async {
        driver.container_start(&container_id).await?;
        log::info!("build sandbox `{container_name}` up for job {job_id}");

        stage_inputs(driver, config, job, &container_id).await?;

        let mut build_log = Vec::new();
        for task in &job.build_tasks {
            match task_runner::run_task(
                driver.inner(),
                &container_id,
                &config.upload_root,
                &job.result_dir,
                job,
                Stage::Build,
                task,
            )
            .await
            {
                Ok(result_log) => build_log.push(result_log),
                Err(err) => {
                    build_log.push(ResultLog::internal_error(task.id));
                    return Err((build_log, err));
                }
            }
        }
        Ok(build_log)
    }
    .await;

    driver.container_stop_and_remove(&container_id).await.ok();
    log::info!("build sandbox `{container_name}` torn down for job {job_id}");

    match outcome {
        Ok(build_log) => (build_log, None),
        Err((build_log, err)) => (build_log, Some(err)),
    }
}

async fn run_judge_stage(
    driver: &ContainerDriver,
    config: &Config,
    job: &JobDetail,
    volume_name: &str,
    job_id: &Uuid,
) -> (Vec<ResultLog>, Option<JudgeError>) {
    let container_name = ContainerDriver::sandbox_name(SandboxRole::Judge, job_id);
    let image = ContainerDriver::image_for(SandboxRole::Judge, config);

    let container_id = match driver
        .container_create(config, &container_name, &image, volume_name, job.memory_mb)
        .await
    {
        Ok(id) => id,
        Err(err) => return (Vec::new(), Some(err)),
    };

    let outcome = async {
        driver.container_start(&container_id).await?;
        log::info!("judge sandbox `{container_name}` up for job {job_id}");

        let mut judge_log = Vec::new();
        for task in &job.judge_tasks {
            match task_runner::run_task(
                driver.inner(),
                &container_id,
                &config.upload_root,
                &job.result_dir,
                job,
                Stage::Judge,
                task,
            )
            .await
            {
                Ok(result_log) => judge_log.push(result_log),
                Err(err) => {
                    judge_log.push(ResultLog::internal_error(task.id));
                    return Err((judge_log, err));
                }
            }
        }
        Ok(judge_log)
    }
    .await;

    driver.container_stop_and_remove(&container_id).await.ok();
    log::info!("judge sandbox `{container_name}` torn down for job {job_id}");

    match outcome {
        Ok(judge_log) => (judge_log, None),
        Err((judge_log, err)) => (judge_log, Some(err)),
    }
}

/// Packs and uploads the test files and the submission tree into the build
/// container's `/home/guest`, before any build task runs. A missing file
/// here is an internal error and aborts the stage before any task log entry
/// is appended.
async fn stage_inputs(
    driver: &ContainerDriver,
    config: &Config,
    job: &JobDetail,
    container_id: &str,
) -> Result<(), JudgeError> {
    for test_file in &job.test_files {
        let host_path = config.upload_root.join(test_file);
        let tar_bytes = tar_pack::pack(&host_path)
            .map_err(|e| JudgeError::Io(format!("failed to pack test file {test_file}: {e}")))?;
        driver
            .copy_to_container(container_id, "/home/guest/", tar_bytes)
            .await?;
    }

    let submission_path = config.upload_root.join(&job.file_dir);
    let tar_bytes = tar_pack::pack(&submission_path).map_err(|e| {
        JudgeError::Io(format!(
            "failed to pack submission directory {}: {e}",
            job.file_dir
        ))
    })?;
    driver
        .copy_to_container(container_id, "/home/guest/", tar_bytes)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    fn log_with_status(status: Status) -> ResultLog {
        ResultLog {
            test_case_id: 1,
            result_id: status,
            time_ms: 0,
            memory_kb: 0,
            exit_code: 0,
            stdout_path: String::new(),
            stderr_path: String::new(),
        }
    }

    #[test]
    fn ac_build_log_does_not_suppress_judge_stage() {
        assert!(!has_fatal_build_status(&[log_with_status(Status::AC)]));
    }

    #[test]
    fn ie_build_log_suppresses_judge_stage() {
        assert!(has_fatal_build_status(&[log_with_status(Status::IE)]));
    }

    #[test]
    fn ce_build_log_suppresses_judge_stage() {
        assert!(has_fatal_build_status(&[log_with_status(Status::CE)]));
    }

    #[test]
    fn empty_build_log_does_not_suppress_judge_stage() {
        assert!(!has_fatal_build_status(&[]));
    }
}
