use super::CliError;
use super::helpers::*;
use std::path::PathBuf;
use vald_core::domain::{ByteSize, WavelengthRange};
use vald_core::modules::acquisition::{SystemAcquisitionPipeline, StopReason};
use vald_core::modules::combine::{CombineMode, combine_line_lists, format_file};
use vald_core::modules::spectrum::{EnergyUnit, SpectrumOptions, vald_to_spectrum};
use vald_core::modules::split::split_line_list;
use vald_core::modules::turbo::{
    ExternalReformatter, MergePolicy, turbo_sort, vald_to_sorted_turbo, vald_to_turbo,
    vald_to_turbo_batch,
};

#[derive(clap::Args)]
pub(super) struct FormatArgs {
    /// VALD line list to rewrite
    input: PathBuf,

    /// Rewritten output path
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct CombineArgs {
    /// Line lists to combine, in order
    inputs: Vec<PathBuf>,

    /// Also combine every matching file in this folder, in file-name order
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// File-name pattern applied to --input-dir
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,

    /// Combined output path
    #[arg(short, long)]
    output: PathBuf,

    /// Rewrite reference lines for Turbospectrum
    #[arg(long)]
    format: bool,
}

#[derive(clap::Args)]
pub(super) struct SplitArgs {
    /// VALD line list to split
    input: PathBuf,

    /// Maximum chunk size, e.g. 100mb (units: b, kb, mb, gb)
    #[arg(long, default_value = "100mb")]
    max_size: ByteSize,

    /// Folder for the chunks (default: next to the input)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(super) enum EnergyUnitArg {
    /// Energies in eV
    Ev,
    /// Energies in cm^-1
    Wavenumber,
}

impl From<EnergyUnitArg> for EnergyUnit {
    fn from(value: EnergyUnitArg) -> Self {
        match value {
            EnergyUnitArg::Ev => Self::ElectronVolt,
            EnergyUnitArg::Wavenumber => Self::Wavenumber,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct ToSpectrumArgs {
    /// VALD line list to convert
    input: PathBuf,

    /// SPECTRUM line list output path
    output: PathBuf,

    /// Unit of the energies in the VALD file
    #[arg(long, value_enum, default_value = "ev")]
    energy_unit: EnergyUnitArg,

    /// Add the mass-number column for SPECTRUM isotope mode
    #[arg(long)]
    isotope: bool,

    /// Fail on species SPECTRUM cannot represent instead of skipping them
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Args)]
pub(super) struct ToolArgs {
    /// Path to the vald3line-BPz-freeformat executable
    #[arg(long)]
    tool: PathBuf,
}

impl ToolArgs {
    fn reformatter(&self) -> ExternalReformatter {
        ExternalReformatter::new(&self.tool)
    }
}

#[derive(clap::Args)]
pub(super) struct ToTurboArgs {
    #[command(flatten)]
    tool: ToolArgs,

    /// Formatted VALD line list
    input: PathBuf,

    /// Turbospectrum output path
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ToTurboBatchArgs {
    #[command(flatten)]
    tool: ToolArgs,

    /// Folder of formatted VALD line lists
    input_dir: PathBuf,

    /// Folder for the <stem>_TS.lst outputs
    output_dir: PathBuf,

    /// File-name pattern selecting inputs
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,
}

#[derive(clap::Args)]
pub(super) struct MergeArgs {
    /// File-name pattern selecting inputs
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,

    /// Drop byte-identical duplicate lines within a species
    #[arg(long)]
    dedup: bool,
}

impl MergeArgs {
    fn policy(&self) -> MergePolicy {
        if self.dedup {
            MergePolicy::DropExactDuplicates
        } else {
            MergePolicy::KeepAll
        }
    }
}

#[derive(clap::Args)]
pub(super) struct TurboSortArgs {
    /// Folder of Turbospectrum atomic tables
    input_dir: PathBuf,

    /// Merged output path
    output: PathBuf,

    #[command(flatten)]
    merge: MergeArgs,
}

#[derive(clap::Args)]
pub(super) struct ToSortedTurboArgs {
    #[command(flatten)]
    tool: ToolArgs,

    /// Folder of formatted VALD line lists
    input_dir: PathBuf,

    /// Merged output path
    output: PathBuf,

    #[command(flatten)]
    merge: MergeArgs,
}

#[derive(clap::Args)]
pub(super) struct AcquireArgs {
    /// JSON acquisition config
    #[arg(long)]
    config: PathBuf,

    /// First wavelength in angstroms
    #[arg(long)]
    start: f64,

    /// Last wavelength in angstroms
    #[arg(long)]
    end: f64,
}

pub(super) fn run_format_command(args: FormatArgs, json: bool) -> Result<i32, CliError> {
    let report = format_file(&args.input, &args.output)?;
    emit_report(&report, json, || {
        vec![format!(
            "Formatted {} records ({} rewritten) into {}.",
            report.records,
            report.rewritten_records,
            args.output.display()
        )]
    })?;
    Ok(0)
}

pub(super) fn run_combine_command(args: CombineArgs, json: bool) -> Result<i32, CliError> {
    let inputs = resolve_inputs(args.inputs, args.input_dir.as_deref(), &args.pattern)?;
    let mode = if args.format {
        CombineMode::Format
    } else {
        CombineMode::NoFormat
    };
    let report = combine_line_lists(&inputs, &args.output, mode)?;
    emit_report(&report, json, || {
        vec![format!(
            "Combined {} files ({} records) into {}.",
            report.input_files,
            report.records,
            args.output.display()
        )]
    })?;
    Ok(0)
}

pub(super) fn run_split_command(args: SplitArgs, json: bool) -> Result<i32, CliError> {
    let report = split_line_list(&args.input, args.max_size, args.output_dir.as_deref())?;
    emit_report(&report, json, || {
        let mut lines = vec![format!(
            "Split {} records into {} files of at most {} bytes:",
            report.records,
            report.outputs.len(),
            report.max_bytes
        )];
        lines.extend(report.outputs.iter().map(|path| format!("  {}", path.display())));
        lines
    })?;
    Ok(0)
}

pub(super) fn run_to_spectrum_command(args: ToSpectrumArgs, json: bool) -> Result<i32, CliError> {
    let options = SpectrumOptions {
        energy_unit: args.energy_unit.into(),
        isotope_column: args.isotope,
        strict: args.strict,
    };
    let report = vald_to_spectrum(&args.input, &args.output, &options)?;
    emit_report(&report, json, || {
        let mut lines = vec![format!(
            "Converted {} records into {}.",
            report.converted,
            args.output.display()
        )];
        if report.skipped_unsupported > 0 {
            let species = report
                .skipped_species
                .iter()
                .map(|(species, count)| format!("{species} x{count}"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "Skipped {} records with unsupported species: {}",
                report.skipped_unsupported, species
            ));
        }
        lines
    })?;
    Ok(0)
}

pub(super) fn run_to_turbo_command(args: ToTurboArgs, json: bool) -> Result<i32, CliError> {
    vald_to_turbo(&args.tool.reformatter(), &args.input, &args.output)?;
    emit_report(&serde_json::json!({ "output": &args.output }), json, || {
        vec![format!("Wrote {}.", args.output.display())]
    })?;
    Ok(0)
}

pub(super) fn run_to_turbo_batch_command(
    args: ToTurboBatchArgs,
    json: bool,
) -> Result<i32, CliError> {
    let report = vald_to_turbo_batch(
        &args.tool.reformatter(),
        &args.input_dir,
        &args.pattern,
        &args.output_dir,
    )?;
    emit_report(&report, json, || {
        vec![format!(
            "Converted {} files into {}.",
            report.outputs.len(),
            args.output_dir.display()
        )]
    })?;
    Ok(0)
}

pub(super) fn run_turbo_sort_command(args: TurboSortArgs, json: bool) -> Result<i32, CliError> {
    let report = turbo_sort(
        &args.input_dir,
        &args.merge.pattern,
        &args.output,
        args.merge.policy(),
    )?;
    emit_report(&report, json, || merge_summary_lines(&report, &args.output))?;
    Ok(0)
}

pub(super) fn run_to_sorted_turbo_command(
    args: ToSortedTurboArgs,
    json: bool,
) -> Result<i32, CliError> {
    let report = vald_to_sorted_turbo(
        &args.tool.reformatter(),
        &args.input_dir,
        &args.merge.pattern,
        &args.output,
        args.merge.policy(),
    )?;
    emit_report(&report, json, || merge_summary_lines(&report, &args.output))?;
    Ok(0)
}

fn merge_summary_lines(
    report: &vald_core::modules::turbo::TurboSortReport,
    output: &std::path::Path,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Merged {} files into {} species blocks ({} lines) in {}.",
        report.input_files,
        report.summary.species_blocks,
        report.summary.lines,
        output.display()
    )];
    if report.summary.dropped_duplicates > 0 {
        lines.push(format!(
            "Dropped {} duplicate lines.",
            report.summary.dropped_duplicates
        ));
    }
    lines
}

pub(super) fn run_acquire_command(args: AcquireArgs, json: bool) -> Result<i32, CliError> {
    let config = load_acquisition_config(&args.config)?;
    let requested = WavelengthRange::new(args.start, args.end)?;
    tracing::info!(
        server = config.server.as_str(),
        range = %requested,
        "starting acquisition"
    );
    let mut pipeline = SystemAcquisitionPipeline::from_config(config)?;
    let report = pipeline
        .run(requested)
        .map_err(|error| CliError::Core(error.into_vald_error()))?;

    emit_report(&report, json, || {
        let mut lines: Vec<String> = report
            .files
            .iter()
            .map(|file| {
                format!(
                    "Range {}: {} records in {}",
                    file.index,
                    file.records,
                    file.path.display()
                )
            })
            .collect();
        lines.push(match report.stop_reason {
            StopReason::RangeCovered => format!("Covered {}.", report.requested),
            StopReason::EmptyExtraction => {
                "Stopped early: VALD returned an extraction without records.".to_string()
            }
            StopReason::NoProgress => {
                "Stopped early: the last wavelength did not advance.".to_string()
            }
            StopReason::RequestLimit => {
                "Stopped early: max_requests reached before the requested end.".to_string()
            }
        });
        lines
    })?;
    Ok(0)
}
