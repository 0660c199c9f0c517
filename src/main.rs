//! pkgforge CLI entrypoint.
//!
//! This binary loads a package manifest, resolves the execution target and
//! root directory layout, and drives the download/extract/install pipeline,
//! reporting progress on stderr.

use clap::Parser;
use pkgforge::cli::Cli;
use pkgforge::error::Result;
use pkgforge::manifest::{load_manifest, RootLayout};
use pkgforge::pipeline::install_many_packages;
use pkgforge::target::ExecutionTarget;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let roots = match &cli.project_root {
        Some(root) => RootLayout::under(root),
        None => RootLayout::from_env()?,
    };

    let target = ExecutionTarget::from_host(
        &cli.host,
        cli.port,
        cli.user.clone(),
        cli.password.clone(),
    )?;

    let packages = load_manifest(&cli.manifest)?;

    if cli.quiet {
        install_many_packages(&packages, &roots, &target, &mut std::io::sink())
    } else {
        install_many_packages(&packages, &roots, &target, stderr)
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
