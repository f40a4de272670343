//! Bucket policy compiler CLI
//!
//! Reads a bucket security configuration, validates it and prints the
//! compiled artifact (resource policy, lifecycle, object lock and baseline
//! settings) as JSON for the provisioning layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use bucket_policy_compiler_core::{
    ensure_object_lock_monotonic, BucketSecurityConfig, CompiledArtifact, Compiler,
    CompilerOptions, ValidationError,
};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};

mod config;

/// Exit code for a configuration that was read but rejected.
const EXIT_REJECTED: u8 = 2;

/// Compile bucket security configurations into resource policies
#[derive(Parser)]
#[command(name = "bucket-policy-compiler")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print the compiled artifact
    Compile {
        /// Configuration file (.toml or .json), or - for JSON on stdin
        config: PathBuf,

        /// Write the artifact to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit single-line JSON
        #[arg(long)]
        compact: bool,

        /// Reject object lock settings supplied while object lock is disabled
        #[arg(long, env = "BPC_STRICT_OBJECT_LOCK")]
        strict_object_lock: bool,

        /// The bucket already exists with object lock enabled
        #[arg(long)]
        object_lock_previously_enabled: bool,
    },

    /// Validate a configuration without printing the artifact
    Validate {
        /// Configuration file (.toml or .json), or - for JSON on stdin
        config: PathBuf,

        /// Reject object lock settings supplied while object lock is disabled
        #[arg(long, env = "BPC_STRICT_OBJECT_LOCK")]
        strict_object_lock: bool,
    },

    /// Print the JSON schema of the configuration format
    Schema,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Compile {
            config,
            output,
            compact,
            strict_object_lock,
            object_lock_previously_enabled,
        } => {
            let bucket = config::load(&config)?;
            let artifact = match compile(&bucket, strict_object_lock) {
                Ok(artifact) => artifact,
                Err(err) => return Ok(report_rejection(&bucket, &err)),
            };

            if let Err(err) =
                ensure_object_lock_monotonic(object_lock_previously_enabled, &artifact)
            {
                eprintln!("Error: {}", err);
                return Ok(ExitCode::from(EXIT_REJECTED));
            }

            let rendered = if compact {
                artifact.to_json()?
            } else {
                artifact.to_json_pretty()?
            };
            write_output(output.as_deref(), &rendered)?;
            info!(
                "Compiled bucket {} with {} statements",
                artifact.bucket,
                artifact.policy_document.statements.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            config,
            strict_object_lock,
        } => {
            let bucket = config::load(&config)?;
            match compile(&bucket, strict_object_lock) {
                Ok(_) => {
                    eprintln!("Configuration for bucket '{}' is valid", bucket.name);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => Ok(report_rejection(&bucket, &err)),
            }
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(BucketSecurityConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn compile(
    bucket: &BucketSecurityConfig,
    strict_object_lock: bool,
) -> std::result::Result<CompiledArtifact, ValidationError> {
    Compiler::with_options(CompilerOptions { strict_object_lock }).compile(bucket)
}

fn report_rejection(bucket: &BucketSecurityConfig, err: &ValidationError) -> ExitCode {
    eprintln!(
        "Configuration for bucket '{}' is invalid ({} problem(s)):",
        bucket.name,
        err.violations().len()
    );
    for violation in err.violations() {
        eprintln!("  - {}", violation);
    }
    ExitCode::from(EXIT_REJECTED)
}

fn write_output(path: Option<&Path>, rendered: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, format!("{}\n", rendered))
            .with_context(|| format!("failed to write artifact to {}", path.display())),
        None => {
            println!("{}", rendered);
            Ok(())
        }
    }
}
