use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{debug, info};
use schemars::schema_for;
use sdfmap_common::{
    CommunicationKind, FlowSettings, FlowSettingsBuilder, MappingError, MappingFlow,
    MappingReport, ParetoBasis, StorageSplitKind,
};
use sdfmap_core::{load_model, write_model, ApplicationGraph, PlatformGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommunicationArg {
    Generic,
    Dma,
}

impl From<CommunicationArg> for CommunicationKind {
    fn from(value: CommunicationArg) -> Self {
        match value {
            CommunicationArg::Generic => CommunicationKind::Generic,
            CommunicationArg::Dma => CommunicationKind::Dma,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageSplitArg {
    Half,
    Shared,
}

impl From<StorageSplitArg> for StorageSplitKind {
    fn from(value: StorageSplitArg) -> Self {
        match value {
            StorageSplitArg::Half => StorageSplitKind::Half,
            StorageSplitArg::Shared => StorageSplitKind::Shared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParetoBasisArg {
    Tdma,
    ExecutionTime,
}

impl From<ParetoBasisArg> for ParetoBasis {
    fn from(value: ParetoBasisArg) -> Self {
        match value {
            ParetoBasisArg::Tdma => ParetoBasis::Tdma,
            ParetoBasisArg::ExecutionTime => ParetoBasis::ExecutionTime,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Maps scenario-aware dataflow applications onto tiled multiprocessors")]
pub struct MappingArgs {
    #[arg(
        short = 'a',
        long,
        help = "The application graph, as json, msgpack or cbor.",
        required_unless_present = "print_schema"
    )]
    pub application: Option<PathBuf>,
    #[arg(
        short = 'p',
        long,
        help = "The platform graph, as json, msgpack or cbor.",
        required_unless_present = "print_schema"
    )]
    pub platform: Option<PathBuf>,
    #[arg(
        short = 'o',
        long,
        help = "Where the mapping report is written. Printed as json when absent."
    )]
    pub output: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = 8,
        help = "Candidate bindings kept after every pruning step."
    )]
    pub max_app_bindings: usize,
    #[arg(long, value_enum, default_value_t = CommunicationArg::Generic)]
    pub communication_model: CommunicationArg,
    #[arg(long, value_enum, default_value_t = StorageSplitArg::Half)]
    pub storage_split: StorageSplitArg,
    #[arg(long, value_enum, default_value_t = ParetoBasisArg::Tdma)]
    pub pareto_basis: ParetoBasisArg,
    #[arg(
        long,
        help = "Gives scenarios sharing a scenario graph private copies of it.",
        default_value = "false"
    )]
    pub isolate_scenarios: bool,
    #[arg(
        long = "schemas",
        help = "Prints the json schemas of the input and output models.",
        default_value = "false"
    )]
    pub print_schema: bool,
    #[arg(
        short = 'v',
        long,
        default_value = "info",
        help = "Log level: off, error, warn, info, debug or trace. RUST_LOG takes precedence."
    )]
    pub verbosity: String,
}

impl MappingArgs {
    pub fn settings(&self) -> Result<FlowSettings, MappingError> {
        Ok(FlowSettingsBuilder::default()
            .max_app_bindings(self.max_app_bindings)
            .communication(CommunicationKind::from(self.communication_model))
            .storage_split(StorageSplitKind::from(self.storage_split))
            .pareto_basis(ParetoBasis::from(self.pareto_basis))
            .build()?)
    }
}

/// Json schemas of the application, platform and report models.
pub fn schemas() -> Vec<String> {
    [
        schema_for!(ApplicationGraph),
        schema_for!(PlatformGraph),
        schema_for!(MappingReport),
    ]
    .iter()
    .filter_map(|s| serde_json::to_string_pretty(s).ok())
    .collect()
}

/// Loads the models named in `args`, maps them and writes the report.
/// Answers `None` when no binding meets the throughput constraint.
pub fn execute(args: &MappingArgs) -> Result<Option<MappingReport>, MappingError> {
    let settings = args.settings()?;
    let application_path = args.application.as_ref().ok_or(MappingError::MissingModel("application"))?;
    let platform_path = args.platform.as_ref().ok_or(MappingError::MissingModel("platform"))?;
    let mut application: ApplicationGraph = load_model(application_path)?;
    let platform: PlatformGraph = load_model(platform_path)?;
    if args.isolate_scenarios {
        debug!("isolating the scenarios of {}", application.name);
        application.isolate_scenarios();
    }
    info!(
        "mapping {} ({} scenarios) onto {} ({} tiles)",
        application.name,
        application.nr_scenarios(),
        platform.name,
        platform.tiles.len()
    );
    let report = MappingFlow::new(&application, &platform, settings).run()?;
    if let (Some(report), Some(output)) = (&report, &args.output) {
        write_model(output, report)?;
        info!("report written to {}", output.display());
    }
    Ok(report)
}
