// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use super::{format_error, Cli, Commands, OutputFormat};

#[test]
fn run_takes_a_config_file() {
    let cli = Cli::try_parse_from(["hivepool", "run", "--config", "pool.toml"]).unwrap();
    match cli.command {
        Commands::Run(args) => assert_eq!(args.config, PathBuf::from("pool.toml")),
        Commands::Status(_) => panic!("expected run"),
    }
}

#[test]
fn run_requires_a_config_file() {
    let err = Cli::try_parse_from(["hivepool", "run"]).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn status_runtime_dir_is_optional() {
    let cli = Cli::try_parse_from(["hivepool", "status"]).unwrap();
    match cli.command {
        Commands::Status(args) => assert_eq!(args.runtime_dir, None),
        Commands::Run(_) => panic!("expected status"),
    }
}

#[test]
fn output_flag_is_global() {
    let cli = Cli::try_parse_from(["hivepool", "status", "--runtime-dir", "/run/hp", "-o", "json"])
        .unwrap();
    assert_eq!(cli.output, OutputFormat::Json);
    match cli.command {
        Commands::Status(args) => assert_eq!(args.runtime_dir, Some(PathBuf::from("/run/hp"))),
        Commands::Run(_) => panic!("expected status"),
    }
}

#[test]
fn subcommand_is_required() {
    let err = Cli::try_parse_from(["hivepool"]).err().unwrap();
    assert!(matches!(
        err.kind(),
        ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    ));
}

#[test]
fn format_error_skips_redundant_chain() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err = anyhow::Error::new(io).context("failed to read pool.toml: no such file");
    assert_eq!(format_error(&err), "failed to read pool.toml: no such file");
}

#[test]
fn format_error_renders_new_causes() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    let err = anyhow::Error::new(io).context("invalid group \"echo\"");
    assert_eq!(
        format_error(&err),
        "invalid group \"echo\"\n\nCaused by:\n    0: no such file"
    );
}

#[test]
fn runtime_is_single_threaded() {
    let runtime = super::runtime().unwrap();
    assert_eq!(
        runtime.handle().runtime_flavor(),
        tokio::runtime::RuntimeFlavor::CurrentThread
    );
}
