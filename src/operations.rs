//! Operations that consume a sorted series.
//!
//! The command line front-end builds a [`RunConfig`] and hands it to [`run`];
//! nothing here reads process-wide state.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use crate::{
    error::SeriesError,
    series_sorter::SeriesSorter,
    volume::{Statistic, Volume, VolumeError},
};

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Input folder {0:?} is not a directory")]
    InputFolder(PathBuf),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Block edges are in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    List,
    Concatenate,
    Average,
    VoxelizeMean { x: f64, y: f64, z: f64 },
    VoxelizeStdDev { x: f64, y: f64, z: f64 },
}

impl Operation {
    pub fn needs_pixel_data(&self) -> bool {
        !matches!(self, Operation::List)
    }

    fn output_name(&self) -> Option<&'static str> {
        match self {
            Operation::List => None,
            Operation::Concatenate => Some("concat.png"),
            Operation::Average => Some("average.png"),
            Operation::VoxelizeMean { .. } => Some("voxelize_mean.csv"),
            Operation::VoxelizeStdDev { .. } => Some("voxelize_stddev.csv"),
        }
    }

    /// Run this operation on an already decoded volume and write its result
    /// into `output_folder`. Returns the written file, if any.
    pub fn apply(
        &self,
        volume: &Volume,
        output_folder: &Path,
    ) -> Result<Option<PathBuf>, OperationError> {
        let Some(name) = self.output_name() else {
            return Ok(None);
        };
        fs::create_dir_all(output_folder)?;
        let output = output_folder.join(name);

        match *self {
            Operation::List => return Ok(None),
            Operation::Concatenate => volume.concatenated_image()?.save(&output)?,
            Operation::Average => volume.average_image()?.save(&output)?,
            Operation::VoxelizeMean { x, y, z } => {
                write_blocks(volume, (x, y, z), Statistic::Mean, &output)?
            }
            Operation::VoxelizeStdDev { x, y, z } => {
                write_blocks(volume, (x, y, z), Statistic::StdDev, &output)?
            }
        }

        info!("Wrote {}", output.display());
        Ok(Some(output))
    }
}

fn write_blocks(
    volume: &Volume,
    edges_mm: (f64, f64, f64),
    statistic: Statistic,
    output: &Path,
) -> Result<(), OperationError> {
    let shape = volume.block_shape(edges_mm)?;
    let mut writer = csv::Writer::from_path(output)?;
    for block in volume.voxelize(shape, statistic) {
        writer.serialize(block)?;
    }
    writer.flush()?;
    Ok(())
}

/// Results land here, inside the input folder, unless an output folder is
/// given. Discovery only lists files, so the series stays readable on the
/// next run.
pub const DEFAULT_OUTPUT_DIR: &str = "dcp-out";

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub operation: Operation,
}

impl RunConfig {
    pub fn new(
        input_folder: impl Into<PathBuf>,
        output_folder: Option<PathBuf>,
        operation: Operation,
    ) -> Self {
        let input_folder = input_folder.into();
        let output_folder = output_folder.unwrap_or_else(|| input_folder.join(DEFAULT_OUTPUT_DIR));
        Self {
            input_folder,
            output_folder,
            operation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Input files in stacking order.
    pub sorted: Vec<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Sort the series in `config.input_folder` and apply `config.operation`.
pub fn run(config: &RunConfig) -> Result<Report, OperationError> {
    if !config.input_folder.is_dir() {
        return Err(OperationError::InputFolder(config.input_folder.clone()));
    }

    let series = SeriesSorter::sort_directory(&config.input_folder)?;
    let sorted = series.paths().map(Path::to_path_buf).collect();

    let output = if config.operation.needs_pixel_data() {
        let volume = Volume::from_series(&series)?;
        config.operation.apply(&volume, &config.output_folder)?
    } else {
        None
    };

    Ok(Report { sorted, output })
}
