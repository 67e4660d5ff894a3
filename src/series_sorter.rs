use std::{ops::Deref, path::Path};

use log::{debug, info};

use crate::{
    error::SeriesError,
    frame::{ReferenceFrame, SliceOrientation, SlicePosition},
    metadata::{AttributeStore, DicomFile, DicomReader, MetadataReader, Tag, load_series},
};

/// Files of one series in stacking order, highest normal coordinate first.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedSeries<F> {
    files: Vec<F>,
}

impl<F> SortedSeries<F> {
    pub fn files(&self) -> &[F] {
        &self.files
    }

    pub fn into_inner(self) -> Vec<F> {
        self.files
    }
}

impl<F> Deref for SortedSeries<F> {
    type Target = [F];

    fn deref(&self) -> &Self::Target {
        &self.files
    }
}

impl<F> IntoIterator for SortedSeries<F> {
    type Item = F;
    type IntoIter = std::vec::IntoIter<F>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl SortedSeries<DicomFile> {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(DicomFile::path)
    }
}

pub struct SeriesSorter;

impl SeriesSorter {
    /// Sort a directory of DICOM files.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be listed, any file is not valid DICOM,
    /// or the series cannot be ordered (see [`SeriesSorter::sort`]).
    pub fn sort_directory(path: impl AsRef<Path>) -> Result<SortedSeries<DicomFile>, SeriesError> {
        Self::sort_directory_with(path, &DicomReader)
    }

    /// Sort a directory, reading each file with `reader`.
    pub fn sort_directory_with<R: MetadataReader>(
        path: impl AsRef<Path>,
        reader: &R,
    ) -> Result<SortedSeries<R::File>, SeriesError> {
        let files = load_series(path, reader)?;
        Self::sort(files)
    }

    /// Order `files` along the normal of their shared slice plane.
    ///
    /// The first file anchors the reference frame. Every position is
    /// projected into that frame and files are stably sorted by descending
    /// normal coordinate.
    ///
    /// # Errors
    ///
    /// * [`SeriesError::EmptySeries`] if `files` is empty
    /// * [`SeriesError::InconsistentOrientation`] if any file's orientation
    ///   text differs from the first file's
    /// * a malformed metadata error if an orientation or position has the
    ///   wrong arity, does not parse, or yields a degenerate frame
    ///
    /// Nothing is reordered unless every file could be keyed.
    pub fn sort<F: AttributeStore>(files: Vec<F>) -> Result<SortedSeries<F>, SeriesError> {
        let first = files.first().ok_or(SeriesError::EmptySeries)?;

        let orientation_text = first.attribute(Tag::ImageOrientationPatient)?;
        let orientation = SliceOrientation::from_attribute(&orientation_text)?;
        Self::check_orientations(&files, &orientation_text)?;

        let anchor = SlicePosition::from_attribute(&first.attribute(Tag::ImagePositionPatient)?)?;
        let world_to_frame = ReferenceFrame::new(&orientation, &anchor)?.invert()?;
        debug!("Anchored series frame at {:?}", anchor.0);

        let keys = files
            .iter()
            .map(|file| Self::sort_key(file, &world_to_frame))
            .collect::<Result<Vec<_>, _>>()?;

        let mut keyed: Vec<_> = keys.into_iter().zip(files).collect();
        keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        debug!(
            "Sort keys: {:?}",
            keyed.iter().map(|(key, _)| *key).collect::<Vec<_>>()
        );
        info!("Sorted {} slices", keyed.len());

        Ok(SortedSeries {
            files: keyed.into_iter().map(|(_, file)| file).collect(),
        })
    }

    fn check_orientations<F: AttributeStore>(
        files: &[F],
        expected: &str,
    ) -> Result<(), SeriesError> {
        let expected_trimmed = trim_padding(expected);
        for (index, file) in files.iter().enumerate() {
            let found = file.attribute(Tag::ImageOrientationPatient)?;
            if !trim_padding(&found).eq_ignore_ascii_case(expected_trimmed) {
                return Err(SeriesError::InconsistentOrientation {
                    index,
                    expected: expected.to_string(),
                    found,
                });
            }
        }
        Ok(())
    }

    fn sort_key<F: AttributeStore>(
        file: &F,
        world_to_frame: &ReferenceFrame,
    ) -> Result<f64, SeriesError> {
        let position = SlicePosition::from_attribute(&file.attribute(Tag::ImagePositionPatient)?)?;
        Ok(world_to_frame.transform(&position.to_homogeneous())[2])
    }
}

fn trim_padding(text: &str) -> &str {
    text.trim_end_matches([' ', '\0'])
}
