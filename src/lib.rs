//! # DICOM-series library
//!
//! This crate puts the slices of a DICOM series into stacking order.
//!
//! Every file of a series carries its own position (ImagePositionPatient)
//! and the orientation of the slice plane (ImageOrientationPatient). The
//! files are assumed to be one acquisition, so all of them must share the
//! same orientation text; a series mixing scan planes is rejected.
//!
//! The first file anchors a reference frame built from the row axis, the
//! column axis and their normal. Every position is projected into that
//! frame and the files are stably sorted by descending coordinate along the
//! normal. Anything that prevents a trustworthy order (empty series, wrong
//! number of components, unparseable numbers, degenerate orientation) is an
//! error rather than a best guess.
//!
//! On top of the ordering, [`operations`] decodes the sorted pixel data into
//! a [`volume::Volume`] and offers averaging, concatenation and block
//! voxelization.
//!
//! # Examples
//!
//! ## Sorting a directory
//!
//! ```no_run
//! # use dicom_series::SeriesSorter;
//! let series = SeriesSorter::sort_directory("dicom")
//!     .expect("should have sorted files from directory");
//! for path in series.paths() {
//!     println!("{}", path.display());
//! }
//! ```
//!
//! ## Sorting metadata obtained elsewhere
//!
//! ```
//! # use dicom_series::{AttributeMap, SeriesSorter, Tag};
//! let slice = |position: &str| {
//!     AttributeMap::new()
//!         .with(Tag::ImageOrientationPatient, "1\\0\\0\\0\\1\\0")
//!         .with(Tag::ImagePositionPatient, position)
//! };
//! let series = SeriesSorter::sort(vec![slice("0\\0\\0"), slice("0\\0\\10"), slice("0\\0\\5")])
//!     .expect("should have sorted the series");
//! assert_eq!(series[0], slice("0\\0\\10"));
//! ```

pub mod attribute;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod operations;
pub mod series_sorter;
pub mod volume;

pub use error::{ErrorKind, SeriesError};
pub use metadata::{AttributeMap, AttributeStore, DicomFile, Tag};
pub use series_sorter::{SeriesSorter, SortedSeries};
