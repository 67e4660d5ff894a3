use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use dicom_series::operations::{Operation, RunConfig, run};
use log::error;

/// Sort a folder of DICOM slices and run an operation on the stacked series.
#[derive(Parser, Debug)]
#[command(author, about, version)]
struct Args {
    /// folder holding the DICOM files of one series
    #[arg(short, long)]
    input_folder: PathBuf,

    /// where results are written, defaults to dcp-out inside the input folder
    #[arg(short, long)]
    output_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the files in stacking order
    List,
    /// stack all slices into one image
    Concat,
    /// average all slices into one image
    Average,
    /// mean per block, block edges in millimetres
    VoxelizeMean { x: f64, y: f64, z: f64 },
    /// standard deviation per block, block edges in millimetres
    VoxelizeStddev { x: f64, y: f64, z: f64 },
}

impl From<Command> for Operation {
    fn from(command: Command) -> Self {
        match command {
            Command::List => Operation::List,
            Command::Concat => Operation::Concatenate,
            Command::Average => Operation::Average,
            Command::VoxelizeMean { x, y, z } => Operation::VoxelizeMean { x, y, z },
            Command::VoxelizeStddev { x, y, z } => Operation::VoxelizeStdDev { x, y, z },
        }
    }
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig::new(args.input_folder, args.output_folder, args.command.into())
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let config = RunConfig::from(Args::parse());
    match run(&config) {
        Ok(report) => {
            if config.operation == Operation::List {
                for path in &report.sorted {
                    println!("{}", path.display());
                }
            }
            if let Some(output) = report.output {
                println!("{}", output.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
