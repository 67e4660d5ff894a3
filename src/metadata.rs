use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use dicom::{
    core::Tag as DicomTag,
    object::{FileDicomObject, InMemDicomObject, open_file},
};
use dicom_dictionary_std::tags;
use log::{debug, info};
use rayon::prelude::*;

use crate::{
    discovery::{FileKind, list_entries},
    error::SeriesError,
};

/// Attributes the series code knows how to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    ImageOrientationPatient,
    ImagePositionPatient,
    InstanceNumber,
    PixelSpacing,
    SliceThickness,
}

impl Tag {
    pub fn name(&self) -> &'static str {
        match self {
            Tag::ImageOrientationPatient => "ImageOrientationPatient",
            Tag::ImagePositionPatient => "ImagePositionPatient",
            Tag::InstanceNumber => "InstanceNumber",
            Tag::PixelSpacing => "PixelSpacing",
            Tag::SliceThickness => "SliceThickness",
        }
    }

    pub fn dicom_tag(&self) -> DicomTag {
        match self {
            Tag::ImageOrientationPatient => tags::IMAGE_ORIENTATION_PATIENT,
            Tag::ImagePositionPatient => tags::IMAGE_POSITION_PATIENT,
            Tag::InstanceNumber => tags::INSTANCE_NUMBER,
            Tag::PixelSpacing => tags::PIXEL_SPACING,
            Tag::SliceThickness => tags::SLICE_THICKNESS,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read access to the attributes of one slice file.
///
/// Multi-valued attributes are returned as backslash separated text.
pub trait AttributeStore {
    fn attribute(&self, tag: Tag) -> Result<String, SeriesError>;
}

impl<T: AttributeStore + ?Sized> AttributeStore for &T {
    fn attribute(&self, tag: Tag) -> Result<String, SeriesError> {
        (**self).attribute(tag)
    }
}

impl<T: AttributeStore + ?Sized> AttributeStore for Arc<T> {
    fn attribute(&self, tag: Tag) -> Result<String, SeriesError> {
        (**self).attribute(tag)
    }
}

/// In-memory attribute store, for series whose metadata was obtained
/// elsewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    values: HashMap<Tag, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: Tag, value: impl Into<String>) -> Self {
        self.insert(tag, value);
        self
    }

    pub fn insert(&mut self, tag: Tag, value: impl Into<String>) {
        self.values.insert(tag, value.into());
    }
}

impl AttributeStore for AttributeMap {
    fn attribute(&self, tag: Tag) -> Result<String, SeriesError> {
        self.values
            .get(&tag)
            .cloned()
            .ok_or(SeriesError::MissingAttribute { tag })
    }
}

/// A DICOM file on disk together with its parsed data set.
pub struct DicomFile {
    path: PathBuf,
    object: FileDicomObject<InMemDicomObject>,
}

impl DicomFile {
    pub fn new(path: impl Into<PathBuf>, object: FileDicomObject<InMemDicomObject>) -> Self {
        Self {
            path: path.into(),
            object,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, SeriesError> {
        let path = path.as_ref();
        let object = open_file(path)?;
        Ok(Self::new(path, object))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn object(&self) -> &FileDicomObject<InMemDicomObject> {
        &self.object
    }
}

impl fmt::Debug for DicomFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DicomFile").field("path", &self.path).finish()
    }
}

impl AttributeStore for DicomFile {
    fn attribute(&self, tag: Tag) -> Result<String, SeriesError> {
        let element = self
            .object
            .element(tag.dicom_tag())
            .map_err(|_| SeriesError::MissingAttribute { tag })?;
        let text = element.to_str().map_err(|e| SeriesError::AttributeValue {
            tag,
            message: e.to_string(),
        })?;
        Ok(text.into_owned())
    }
}

/// Turns a path into a file handle with attribute lookup.
pub trait MetadataReader: Sync {
    type File: AttributeStore + Send;

    fn read(&self, path: &Path) -> Result<Self::File, SeriesError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DicomReader;

impl MetadataReader for DicomReader {
    type File = DicomFile;

    fn read(&self, path: &Path) -> Result<Self::File, SeriesError> {
        DicomFile::open(path)
    }
}

/// Load every regular file in `path` with `reader`.
///
/// Files are read in parallel but returned in file name order, so the first
/// handle is the same on every run. A single unreadable file fails the whole
/// load.
pub fn load_series<R: MetadataReader>(
    path: impl AsRef<Path>,
    reader: &R,
) -> Result<Vec<R::File>, SeriesError> {
    let mut paths = list_entries(path.as_ref(), FileKind::File)?;
    paths.sort();
    info!(
        "Loading {} files from {}",
        paths.len(),
        path.as_ref().display()
    );

    paths
        .par_iter()
        .map(|path| {
            debug!("Reading {}", path.display());
            reader.read(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct TextReader;

    impl MetadataReader for TextReader {
        type File = AttributeMap;

        fn read(&self, path: &Path) -> Result<Self::File, SeriesError> {
            let text = fs::read_to_string(path)?;
            if text.is_empty() {
                return Err(SeriesError::MissingAttribute {
                    tag: Tag::ImagePositionPatient,
                });
            }
            Ok(AttributeMap::new().with(Tag::ImagePositionPatient, text))
        }
    }

    #[test]
    fn test_attribute_map_lookup() {
        let map = AttributeMap::new().with(Tag::ImagePositionPatient, "0\\0\\1");
        assert_eq!(map.attribute(Tag::ImagePositionPatient).unwrap(), "0\\0\\1");
        assert!(matches!(
            map.attribute(Tag::ImageOrientationPatient),
            Err(SeriesError::MissingAttribute {
                tag: Tag::ImageOrientationPatient
            })
        ));
    }

    #[test]
    fn test_shared_handles_delegate() {
        let map = Arc::new(AttributeMap::new().with(Tag::InstanceNumber, "4"));
        assert_eq!(map.attribute(Tag::InstanceNumber).unwrap(), "4");
        assert_eq!((&map).attribute(Tag::InstanceNumber).unwrap(), "4");
    }

    #[test]
    fn test_load_series_keeps_file_name_order() {
        let dir = tempdir().unwrap();
        for (name, position) in [("c", "0\\0\\3"), ("a", "0\\0\\1"), ("b", "0\\0\\2")] {
            fs::write(dir.path().join(name), position).unwrap();
        }
        fs::create_dir(dir.path().join("ignored")).unwrap();

        let files = load_series(dir.path(), &TextReader).unwrap();
        let positions: Vec<_> = files
            .iter()
            .map(|f| f.attribute(Tag::ImagePositionPatient).unwrap())
            .collect();
        assert_eq!(positions, vec!["0\\0\\1", "0\\0\\2", "0\\0\\3"]);
    }

    #[test]
    fn test_load_series_fails_on_any_bad_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "0\\0\\1").unwrap();
        fs::write(dir.path().join("b"), "").unwrap();

        assert!(load_series(dir.path(), &TextReader).is_err());
    }

    #[test]
    fn test_dicom_reader_rejects_non_dicom() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a dicom file").unwrap();

        let result = load_series(dir.path(), &DicomReader);
        assert!(matches!(result, Err(SeriesError::Dicom(_))));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let result = load_series(dir.path().join("nope"), &DicomReader);
        assert!(matches!(result, Err(SeriesError::Io(_))));
    }
}
