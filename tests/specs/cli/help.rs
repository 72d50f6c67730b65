// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface specs

use crate::prelude::*;

#[test]
fn help_shows_usage() {
    cli().arg("--help").passes().stdout_has("Usage:").stdout_has("--config");
}

#[test]
fn help_lists_supervisor_only() {
    let out = cli().arg("--help").passes();
    assert!(out.stdout().contains("supervisor"));
    assert!(!out.stdout().contains("job-child"), "child roles are internal");
}

#[test]
fn version_shows_package_version() {
    cli().arg("--version").passes().stdout_has("job-item");
}

#[test]
fn unknown_subcommand_is_rejected() {
    cli().arg("frobnicate").fails().stderr_has("frobnicate");
}
