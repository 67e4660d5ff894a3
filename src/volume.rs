use std::path::PathBuf;

use dicom::pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption};
use image::{ImageBuffer, Luma};
use log::{debug, warn};
use ndarray::{Array2, Array3, ArrayView2, Axis, s};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::{
    attribute::{parse_float_vector, parse_single_float},
    error::SeriesError,
    metadata::{AttributeStore, DicomFile, Tag},
    series_sorter::SortedSeries,
};

pub type GrayImage = ImageBuffer<Luma<u8>, Vec<u8>>;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Block edge must be a positive length, got {0} mm")]
    InvalidBlockSize(f64),

    #[error("Cannot decode pixel data of {path:?}: {message}")]
    PixelData { path: PathBuf, message: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    StdDev,
}

/// One block of a voxelized volume, indexed in block units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockValue {
    pub block_z: usize,
    pub block_y: usize,
    pub block_x: usize,
    pub value: f64,
}

/// Pixel data of a sorted series, indexed (slice, row, column).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<u16>,
    /// Millimetres per voxel along (x, y, z), if the series records it.
    spacing: Option<(f64, f64, f64)>,
}

impl Volume {
    pub fn new(data: Array3<u16>, spacing: Option<(f64, f64, f64)>) -> Self {
        Self { data, spacing }
    }

    /// Decode the first frame of every file, stacked in series order.
    pub fn from_series(series: &SortedSeries<DicomFile>) -> Result<Self, VolumeError> {
        if series.is_empty() {
            return Err(VolumeError::NoValidImages);
        }

        let images = series
            .par_iter()
            .map(Self::decode_image)
            .collect::<Result<Vec<_>, _>>()?;
        Self::validate_dimensions(&images)?;

        let spacing = Self::get_spacing(series.files());
        Ok(Self::new(Self::build_volume_array(&images), spacing))
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    pub fn spacing(&self) -> Option<(f64, f64, f64)> {
        self.spacing
    }

    #[inline]
    fn normalize_to_u8(value: f64) -> u8 {
        ((value / 65535.0) * 255.0).clamp(0.0, 255.0) as u8
    }

    fn to_image(slice: ArrayView2<'_, f64>) -> Result<GrayImage, VolumeError> {
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice
            .into_par_iter()
            .map(|&v| Self::normalize_to_u8(v))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
            .ok_or(VolumeError::InconsistentDimensions)
    }

    /// Per-pixel mean over all slices.
    pub fn mean_slice(&self) -> Result<Array2<f64>, VolumeError> {
        self.data
            .mapv(f64::from)
            .mean_axis(Axis(0))
            .ok_or(VolumeError::NoValidImages)
    }

    pub fn average_image(&self) -> Result<GrayImage, VolumeError> {
        let mean = self.mean_slice()?;
        Self::to_image(mean.view())
    }

    /// All slices stacked top to bottom in series order.
    pub fn concatenated_image(&self) -> Result<GrayImage, VolumeError> {
        let (depth, height, width) = self.dim();
        let stacked = Array2::from_shape_vec(
            (depth * height, width),
            self.data.iter().map(|&v| f64::from(v)).collect(),
        )
        .map_err(|_| VolumeError::InconsistentDimensions)?;
        Self::to_image(stacked.view())
    }

    /// Voxel counts of a block whose edges measure `edges_mm` (x, y, z).
    ///
    /// Fails with [`VolumeError::MissingSpacing`] when the volume has no
    /// spacing.
    pub fn block_shape(
        &self,
        edges_mm: (f64, f64, f64),
    ) -> Result<(usize, usize, usize), VolumeError> {
        let to_voxels = |edge: f64, spacing: f64| {
            if !edge.is_finite() || edge <= 0.0 {
                return Err(VolumeError::InvalidBlockSize(edge));
            }
            if !spacing.is_finite() || spacing <= 0.0 {
                return Err(VolumeError::MissingSpacing);
            }
            Ok(((edge / spacing).ceil() as usize).max(1))
        };
        let (x, y, z) = edges_mm;
        let (sx, sy, sz) = self.spacing.ok_or(VolumeError::MissingSpacing)?;
        Ok((to_voxels(z, sz)?, to_voxels(y, sy)?, to_voxels(x, sx)?))
    }

    /// Aggregate the volume over blocks of `shape` voxels (depth, height,
    /// width). Blocks at the far edges may be smaller.
    pub fn voxelize(&self, shape: (usize, usize, usize), statistic: Statistic) -> Vec<BlockValue> {
        let (depth, height, width) = self.dim();
        let (bz, by, bx) = shape;
        debug!("Voxelizing {depth}x{height}x{width} into {bz}x{by}x{bx} blocks");

        let mut blocks = Vec::new();
        for (block_z, z0) in (0..depth).step_by(bz).enumerate() {
            for (block_y, y0) in (0..height).step_by(by).enumerate() {
                for (block_x, x0) in (0..width).step_by(bx).enumerate() {
                    let block = self
                        .data
                        .slice(s![
                            z0..(z0 + bz).min(depth),
                            y0..(y0 + by).min(height),
                            x0..(x0 + bx).min(width)
                        ])
                        .mapv(f64::from);
                    let value = match statistic {
                        Statistic::Mean => block.mean().unwrap_or(0.0),
                        Statistic::StdDev => block.std(0.0),
                    };
                    blocks.push(BlockValue {
                        block_z,
                        block_y,
                        block_x,
                        value,
                    });
                }
            }
        }
        blocks
    }

    fn decode_image(file: &DicomFile) -> Result<Array2<u16>, VolumeError> {
        let pixel_error = |message: String| VolumeError::PixelData {
            path: file.path().to_path_buf(),
            message,
        };
        let pixel_data = file
            .object()
            .decode_pixel_data()
            .map_err(|e| pixel_error(e.to_string()))?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
            .map_err(|e| pixel_error(e.to_string()))
    }

    fn validate_dimensions(images: &[Array2<u16>]) -> Result<(), VolumeError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<u16>]) -> Array3<u16> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<u16>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    // PixelSpacing is (row spacing, column spacing), i.e. (y, x).
    fn get_spacing<F: AttributeStore>(files: &[F]) -> Option<(f64, f64, f64)> {
        let spacing = files.iter().find_map(|file| {
            let pixel_spacing = parse_float_vector(&file.attribute(Tag::PixelSpacing).ok()?).ok()?;
            let slice_thickness =
                parse_single_float(&file.attribute(Tag::SliceThickness).ok()?).ok()?;
            match pixel_spacing[..] {
                [y, x] => Some((x, y, slice_thickness)),
                _ => None,
            }
        });
        if spacing.is_none() {
            warn!("No file carries both PixelSpacing and SliceThickness");
        }
        spacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AttributeMap;
    use ndarray::array;

    fn ramp_volume() -> Volume {
        // depth 2, height 2, width 3
        let data = array![[[0, 1, 2], [3, 4, 5]], [[6, 7, 8], [9, 10, 11]]];
        Volume::new(data, Some((0.5, 0.5, 2.0)))
    }

    #[test]
    fn test_mean_slice() {
        let mean = ramp_volume().mean_slice().unwrap();
        assert_eq!(mean, array![[3.0, 4.0, 5.0], [6.0, 7.0, 8.0]]);
    }

    #[test]
    fn test_concatenated_image_keeps_series_order() {
        let data = Array3::from_shape_fn((3, 2, 2), |(z, _, _)| (z as u16 + 1) * 16384);
        let image = Volume::new(data, Some((1.0, 1.0, 1.0)))
            .concatenated_image()
            .unwrap();
        assert_eq!(image.dimensions(), (2, 6));
        assert_eq!(image.get_pixel(0, 0)[0], 63);
        assert_eq!(image.get_pixel(1, 2)[0], 127);
        assert_eq!(image.get_pixel(0, 5)[0], 191);
    }

    #[test]
    fn test_average_image_dimensions() {
        let image = ramp_volume().average_image().unwrap();
        assert_eq!(image.dimensions(), (3, 2));
    }

    #[test]
    fn test_unspaced_volume_averages_but_cannot_voxelize() {
        let data = Array3::from_shape_fn((3, 2, 4), |(z, y, x)| (z + y + x) as u16);
        let volume = Volume::new(data, None);

        assert_eq!(volume.average_image().unwrap().dimensions(), (4, 2));
        assert_eq!(volume.concatenated_image().unwrap().dimensions(), (4, 6));
        assert!(matches!(
            volume.block_shape((1.0, 1.0, 1.0)),
            Err(VolumeError::MissingSpacing)
        ));
    }

    #[test]
    fn test_block_shape_rounds_up() {
        let volume = ramp_volume();
        assert_eq!(volume.block_shape((1.0, 0.75, 2.0)).unwrap(), (1, 2, 2));
        assert_eq!(volume.block_shape((0.1, 0.1, 0.1)).unwrap(), (1, 1, 1));
        assert!(matches!(
            volume.block_shape((0.0, 1.0, 1.0)),
            Err(VolumeError::InvalidBlockSize(_))
        ));
    }

    #[test]
    fn test_voxelize_mean_with_partial_edge_blocks() {
        let blocks = ramp_volume().voxelize((2, 2, 2), Statistic::Mean);
        assert_eq!(
            blocks,
            vec![
                BlockValue {
                    block_z: 0,
                    block_y: 0,
                    block_x: 0,
                    value: 5.0,
                },
                BlockValue {
                    block_z: 0,
                    block_y: 0,
                    block_x: 1,
                    value: 6.5,
                },
            ]
        );
    }

    #[test]
    fn test_voxelize_stddev() {
        let blocks = ramp_volume().voxelize((2, 1, 1), Statistic::StdDev);
        assert_eq!(blocks.len(), 6);
        assert!(blocks.iter().all(|b| (b.value - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_spacing_from_attributes() {
        let files = vec![
            AttributeMap::new().with(Tag::PixelSpacing, "0.5\\0.7"),
            AttributeMap::new()
                .with(Tag::PixelSpacing, "0.6\\0.8")
                .with(Tag::SliceThickness, "2.5"),
        ];
        assert_eq!(Volume::get_spacing(&files), Some((0.8, 0.6, 2.5)));
        assert_eq!(Volume::get_spacing(&files[..1]), None);
    }

    #[test]
    fn test_inconsistent_dimensions() {
        let images = vec![Array2::<u16>::zeros((2, 2)), Array2::<u16>::zeros((2, 3))];
        assert!(matches!(
            Volume::validate_dimensions(&images),
            Err(VolumeError::InconsistentDimensions)
        ));
    }
}
