use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use env_logger::Target;
use log::LevelFilter;
use rusty_roster::convert;
use rusty_roster::Args;
use rusty_roster::StandardLogger;
use rusty_roster::Statistics;
use std::fs::File;
use std::process::ExitCode;

/// Error messages listed in the run summary
const SUMMARY_ERROR_LIMIT: usize = 10;

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(stats) if !stats.has_errors() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("Failed to initialize logging")?;
    Ok(())
}

fn run(args: &Args) -> Result<Statistics> {
    if !args.input.exists() {
        bail!("Input file not found: {}", args.input.display());
    }

    let options = args.to_options();
    let stats = convert(&args.input, &options, &StandardLogger)
        .with_context(|| format!("Failed to convert '{}'", args.input.display()))?;

    print_summary(args, &options.output.display().to_string(), &stats);
    Ok(stats)
}

fn print_summary(args: &Args, output: &str, stats: &Statistics) {
    let rule = "=".repeat(60);
    println!();
    println!("{rule}");
    println!("PROCESSING COMPLETE");
    println!("{rule}");
    println!("Input file:  {}", args.input.display());
    println!("Output file: {output}");
    println!();
    println!("Statistics:");
    println!("  Total rows:      {}", stats.total_rows);
    println!("  Persons:         {}", stats.persons_created);
    println!("  Locations:       {}", stats.locations_created);
    println!("  Program roles:   {}", stats.roles_created);
    println!("  Errors:          {}", stats.errors);
    println!("  Warnings:        {}", stats.warnings);
    if let Some(path) = &args.log_file {
        println!();
        println!("Log file: {}", path.display());
    }
    println!("{rule}");

    if stats.has_errors() {
        println!();
        println!("Errors encountered during processing:");
        for error in stats.error_details.iter().take(SUMMARY_ERROR_LIMIT) {
            println!("  - {error}");
        }
        if stats.error_details.len() > SUMMARY_ERROR_LIMIT {
            println!("  ... and {} more errors", stats.error_details.len() - SUMMARY_ERROR_LIMIT);
        }
    }
}
