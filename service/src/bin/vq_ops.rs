//! Set up or remove the encrypted exchange in a project.
//!
//! Usage: `cargo run --bin vq-ops -- --root ../my-app install --origin http://localhost:5173`

#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vormiaquery_api::installer::{
    CorsOutcome, EnvFileChange, FrameworkCheck, InstallOptions, InstallReport, Installer,
    UninstallReport,
};

#[derive(Debug, Parser)]
#[command(name = "vq-ops", version, about = "Manage VormiaQuery keys and CORS setup")]
struct Cli {
    /// Project directory containing Cargo.toml and .env
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add key variables, check the framework dependency and publish cors.yaml
    Install {
        /// Remove everything instead (same as `uninstall`)
        #[arg(long)]
        uninstall: bool,

        #[command(flatten)]
        options: SetupArgs,
    },
    /// Re-run the install steps
    Update {
        #[command(flatten)]
        options: SetupArgs,
    },
    /// Remove key variables and cors.yaml
    Uninstall,
}

#[derive(Debug, Args)]
struct SetupArgs {
    /// Do not publish cors.yaml
    #[arg(long)]
    skip_cors: bool,

    /// Allowed origin for a newly published cors.yaml (repeatable)
    #[arg(long = "origin")]
    origins: Vec<String>,

    /// Dependency the host crate is expected to use
    #[arg(long, default_value = "axum")]
    framework_crate: String,
}

impl From<SetupArgs> for InstallOptions {
    fn from(args: SetupArgs) -> Self {
        Self {
            skip_cors: args.skip_cors,
            cors_origins: args.origins,
            framework_crate: args.framework_crate,
        }
    }
}

fn describe(change: EnvFileChange) -> String {
    match change {
        EnvFileChange::Missing => "not found, skipped".to_string(),
        EnvFileChange::Unchanged => "already up to date".to_string(),
        EnvFileChange::Updated(n) => format!("{n} line(s) changed"),
    }
}

fn print_install(report: &InstallReport, options: &InstallOptions) {
    match report.framework {
        FrameworkCheck::Found => println!("{} dependency detected.", options.framework_crate),
        FrameworkCheck::NotFound => println!(
            "warning: {} is not a dependency of this project. Add it before wiring the middleware.",
            options.framework_crate
        ),
        FrameworkCheck::NoManifest => println!("warning: no Cargo.toml found."),
    }
    println!(".env: {}", describe(report.env));
    println!(".env.example: {}", describe(report.env_example));
    match report.cors {
        CorsOutcome::Published => println!("cors.yaml published."),
        CorsOutcome::AlreadyPresent => println!("cors.yaml already published."),
        CorsOutcome::Skipped => {
            println!("cors.yaml not published. Run `vq-ops install` again without --skip-cors to publish it.");
        }
    }
}

fn print_uninstall(report: &UninstallReport) {
    println!(".env: {}", describe(report.env));
    println!(".env.example: {}", describe(report.env_example));
    if report.cors_removed {
        println!("cors.yaml removed.");
    }
    println!("VormiaQuery keys and CORS config removed.");
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let installer = Installer::new(cli.root);

    match cli.command {
        Command::Install {
            uninstall: true, ..
        }
        | Command::Uninstall => {
            let report = installer.uninstall()?;
            print_uninstall(&report);
        }
        Command::Install { options, .. } => {
            let options = InstallOptions::from(options);
            let report = installer.install(&options)?;
            print_install(&report, &options);
            println!("VormiaQuery integration complete!");
        }
        Command::Update { options } => {
            let options = InstallOptions::from(options);
            let report = installer.update(&options)?;
            print_install(&report, &options);
            println!("VormiaQuery integration updated!");
        }
    }

    Ok(())
}
