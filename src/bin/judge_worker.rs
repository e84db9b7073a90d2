// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! CLI entrypoint: reads a `JobDetail` (JSON), runs it against the local
//! container daemon, and prints the resulting `ResultDetail` (JSON) to
//! stdout. The message bus / poller that feeds this process a stream of jobs
//! is someone else's concern — this binary handles exactly one job per
//! invocation.

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use judge_core::{execute_job, Config};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let config = Config::parse();

    let job_json = match &config.job_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                log::error!("failed to read job file {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut buf) {
                log::error!("failed to read job from stdin: {err}");
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    let job = match serde_json::from_str(&job_json) {
        Ok(job) => job,
        Err(err) => {
            log::error!("failed to parse job detail: {err}");
            return ExitCode::FAILURE;
        }
    };

    let driver = match judge_core::docker::ContainerDriver::connect() {
        Ok(driver) => driver,
        Err(err) => {
            log::error!("failed to connect to the container daemon: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = execute_job(&driver, &config, &job).await;

    match serde_json::to_string_pretty(&outcome.result) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("failed to serialise result detail: {err}"),
    }

    match outcome.error {
        Some(err) => {
            log::error!("job did not complete cleanly: {err}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
