// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Typed, environment-driven configuration for the worker binary.

use std::path::PathBuf;

use clap::Parser;

/// Hard ceiling on the cgroup memory/swap limit applied to a sandbox,
/// regardless of what a job requests.
pub const MAX_CONTAINER_MEMORY_MB: u64 = 1024;
/// Headroom added on top of a job's requested `memory_mb` before capping.
pub const CONTAINER_MEMORY_HEADROOM_MB: u64 = 32;
pub const CPU_SET: &str = "0";
pub const PID_LIMIT: i64 = 32;
pub const NOFILE_LIMIT: i64 = 64;
pub const NPROC_LIMIT: i64 = 64;
/// 10 MiB, expressed in 4 KiB blocks, as the daemon's `fsize` ulimit expects.
pub const FSIZE_LIMIT_BLOCKS: i64 = (10 * 1024 * 1024) / 4096;
/// 32 MiB, expressed in KiB, as the daemon's `stack` ulimit expects.
pub const STACK_LIMIT_KB: i64 = 32 * 1024;

#[derive(Clone, Debug, Parser)]
#[command(name = "judge-worker", about = "Executes one judge job in disposable sandboxes")]
pub struct Config {
    /// Host upload root; all paths in a `JobDetail` are relative to this.
    #[arg(long, env = "JUDGE_UPLOAD_ROOT", default_value = "/upload")]
    pub upload_root: PathBuf,

    /// Image used for the build sandbox.
    #[arg(long, env = "JUDGE_BUILD_IMAGE", default_value = "checker-lang-gcc")]
    pub build_image: String,

    /// Image used for the judge sandbox.
    #[arg(long, env = "JUDGE_RUNNER_IMAGE", default_value = "binary-runner")]
    pub judge_image: String,

    /// Seconds the daemon waits after a stop signal before force-killing a
    /// container; we always stop with SIGKILL and zero grace, but the
    /// container's own `StopTimeout` is still configured to this value.
    #[arg(long, env = "JUDGE_CONTAINER_STOP_TIMEOUT_SECS", default_value_t = 120)]
    pub container_stop_timeout_secs: i64,

    /// Upper bound on jobs this worker process will run concurrently.
    #[arg(long, env = "JUDGE_MAX_CONCURRENT_JOBS", default_value_t = 4)]
    pub max_concurrent_jobs: usize,

    /// Path to a `JobDetail` JSON file. If omitted, it is read from stdin.
    #[arg(long)]
    pub job_file: Option<PathBuf>,
}

impl Config {
    /// The memory (and swap) limit, in megabytes, to apply to a sandbox
    /// running a job that requested `memory_mb`: the request plus headroom,
    /// capped at the hard ceiling.
    pub fn sandbox_memory_mb(&self, requested_memory_mb: u64) -> u64 {
        (requested_memory_mb + CONTAINER_MEMORY_HEADROOM_MB).min(MAX_CONTAINER_MEMORY_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_memory_adds_headroom() {
        let config = Config::parse_from(["judge-worker"]);
        assert_eq!(config.sandbox_memory_mb(256), 288);
    }

    #[test]
    fn sandbox_memory_is_capped_at_the_hard_ceiling() {
        let config = Config::parse_from(["judge-worker"]);
        assert_eq!(config.sandbox_memory_mb(2048), MAX_CONTAINER_MEMORY_MB);
    }

    #[test]
    fn defaults_match_the_documented_images() {
        let config = Config::parse_from(["judge-worker"]);
        assert_eq!(config.upload_root, PathBuf::from("/upload"));
        assert_eq!(config.build_image, "checker-lang-gcc");
        assert_eq!(config.judge_image, "binary-runner");
        assert_eq!(config.container_stop_timeout_secs, 120);
    }
}
