mod commands;
mod helpers;

use clap::Parser;
use vald_core::domain::ValdError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_vald_error();
            eprintln!("{}", error.diagnostic_line());
            if let Some(summary_line) = error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("vald-tools".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.verbose, cli.quiet);
            dispatch_parsed(cli.command, cli.json)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "vald-tools", version, about = "VALD line-list acquisition and reformatting")]
struct Cli {
    /// More log output (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the command summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Rewrite the reference line of every record in one file
    Format(commands::FormatArgs),
    /// Concatenate line lists, optionally rewriting reference lines
    Combine(commands::CombineArgs),
    /// Split a line list into size-bounded, record-aligned chunks
    Split(commands::SplitArgs),
    /// Convert a line list into a SPECTRUM line list
    ToSpectrum(commands::ToSpectrumArgs),
    /// Convert one line list with the Turbospectrum reformatter
    ToTurbo(commands::ToTurboArgs),
    /// Convert every line list in a folder with the Turbospectrum reformatter
    ToTurboBatch(commands::ToTurboBatchArgs),
    /// Merge Turbospectrum atomic tables by species and wavelength
    TurboSort(commands::TurboSortArgs),
    /// Convert a folder and merge the results into one Turbospectrum table
    ToSortedTurbo(commands::ToSortedTurboArgs),
    /// Request, download and decompress a wavelength range from VALD
    Acquire(commands::AcquireArgs),
}

fn dispatch_parsed(command: CliCommand, json: bool) -> Result<i32, CliError> {
    match command {
        CliCommand::Format(args) => commands::run_format_command(args, json),
        CliCommand::Combine(args) => commands::run_combine_command(args, json),
        CliCommand::Split(args) => commands::run_split_command(args, json),
        CliCommand::ToSpectrum(args) => commands::run_to_spectrum_command(args, json),
        CliCommand::ToTurbo(args) => commands::run_to_turbo_command(args, json),
        CliCommand::ToTurboBatch(args) => commands::run_to_turbo_batch_command(args, json),
        CliCommand::TurboSort(args) => commands::run_turbo_sort_command(args, json),
        CliCommand::ToSortedTurbo(args) => commands::run_to_sorted_turbo_command(args, json),
        CliCommand::Acquire(args) => commands::run_acquire_command(args, json),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Core(ValdError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ValdError> for CliError {
    fn from(error: ValdError) -> Self {
        Self::Core(error)
    }
}

impl CliError {
    fn as_vald_error(&self) -> ValdError {
        match self {
            Self::Usage(message) => ValdError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Core(error) => error.clone(),
            Self::Internal(error) => ValdError::internal("INTERNAL.CLI", format!("{error:#}")),
        }
    }
}
