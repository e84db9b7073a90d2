// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The exec channel: runs one command inside an already-running sandbox
//! container and collects its demultiplexed stdout/stderr, honoring a
//! wall-clock timeout.
//!
//! Bollard's `LogOutput` stream already demultiplexes the daemon's
//! mux-framed attach stream for us (the wire format itself is specified and
//! tested independently in [`crate::demux`]); this module owns the
//! concurrency shape around it: a stdin writer racing a reader, the whole
//! thing racing a timeout.

use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::JudgeError;

pub struct ExecConfig {
    pub cmd: Vec<String>,
    pub stdin: String,
    pub working_dir: String,
    pub user: String,
    pub timeout: std::time::Duration,
}

pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Executes `config.cmd` inside `container_id`, waiting up to
/// `config.timeout` for it to finish.
///
/// On timeout, returns `JudgeError::Timeout`; the caller is responsible for
/// tearing down the container, since the daemon offers no way to kill a
/// single exec in flight.
pub async fn exec(
    docker: &Docker,
    container_id: &str,
    config: ExecConfig,
) -> Result<ExecResult, JudgeError> {
    let attach_stdin = !config.stdin.is_empty();

    let exec = docker
        .create_exec(
            container_id,
            CreateExecOptions {
                cmd: Some(config.cmd),
                attach_stdin: Some(attach_stdin),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                working_dir: Some(config.working_dir),
                user: Some(config.user),
                ..Default::default()
            },
        )
        .await?;

    let start_result = docker.start_exec(&exec.id, None).await?;
    let StartExecResults::Attached { mut output, mut input } = start_result else {
        return Err(JudgeError::Protocol(
            "exec was started detached; expected an attached stream".to_string(),
        ));
    };

    let stdin_bytes = config.stdin.into_bytes();
    let writer = async move {
        if !stdin_bytes.is_empty() {
            let _ = input.write_all(&stdin_bytes).await;
        }
        let _ = input.shutdown().await;
    };

    let reader = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(chunk) = output.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => stdout.extend_from_slice(&message),
                Ok(LogOutput::StdErr { message }) => stderr.extend_from_slice(&message),
                Ok(_) => {}
                Err(err) => return Err(JudgeError::from(err)),
            }
        }
        Ok((stdout, stderr))
    };

    let racing = async {
        let (_, read_result) = tokio::join!(writer, reader);
        read_result
    };

    let (stdout, stderr) = match tokio::time::timeout(config.timeout, racing).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(JudgeError::Timeout(format!(
                "exec in container `{container_id}` exceeded {:?}",
                config.timeout
            )));
        }
    };

    let inspected = docker.inspect_exec(&exec.id).await?;
    let exit_code = inspected.exit_code.ok_or_else(|| {
        JudgeError::Protocol(format!(
            "inspected exec `{}` for exit status but status was missing",
            exec.id
        ))
    })?;

    Ok(ExecResult {
        exit_code,
        stdout,
        stderr,
    })
}
