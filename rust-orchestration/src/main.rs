use std::process::ExitCode;

use clap::Parser;
use log::{error, warn, LevelFilter};
use sdfmap_orchestration::{execute, schemas, MappingArgs};

fn main() -> ExitCode {
    let args = MappingArgs::parse();
    let level = args.verbosity.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
    if args.print_schema {
        for schema in schemas() {
            println!("{}", schema);
        }
        return ExitCode::SUCCESS;
    }
    match execute(&args) {
        Ok(Some(report)) => {
            if args.output.is_none() {
                match serde_json::to_string_pretty(&report) {
                    Ok(s) => println!("{}", s),
                    Err(e) => {
                        error!("failed to print the report: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            warn!("no feasible mapping found");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
