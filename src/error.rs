use thiserror::Error;

use crate::metadata::Tag;

/// Coarse classification of a [`SeriesError`], for callers that only need to
/// report what went wrong rather than the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptySeries,
    MalformedMetadata,
    InconsistentSeries,
    Io,
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("Cannot establish reference frame from an empty series")]
    EmptySeries,

    #[error("File {index} has orientation {found:?}, expected {expected:?}")]
    InconsistentOrientation {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{tag} has {found} components, expected {expected}")]
    MalformedAttribute {
        tag: Tag,
        expected: usize,
        found: usize,
    },

    #[error("Invalid numeric value {token:?}")]
    InvalidNumber { token: String },

    #[error("Missing attribute {tag}")]
    MissingAttribute { tag: Tag },

    #[error("Unreadable attribute {tag}: {message}")]
    AttributeValue { tag: Tag, message: String },

    #[error("Orientation vectors are degenerate")]
    DegenerateOrientation,

    #[error("Reference frame is singular")]
    SingularFrame,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

impl SeriesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeriesError::EmptySeries => ErrorKind::EmptySeries,
            SeriesError::InconsistentOrientation { .. } => ErrorKind::InconsistentSeries,
            SeriesError::Io(_) => ErrorKind::Io,
            SeriesError::MalformedAttribute { .. }
            | SeriesError::InvalidNumber { .. }
            | SeriesError::MissingAttribute { .. }
            | SeriesError::AttributeValue { .. }
            | SeriesError::DegenerateOrientation
            | SeriesError::SingularFrame
            | SeriesError::Dicom(_) => ErrorKind::MalformedMetadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_separate_mixed_planes_from_bad_geometry() {
        let mixed = SeriesError::InconsistentOrientation {
            index: 1,
            expected: "1\\0\\0\\0\\1\\0".into(),
            found: "0\\1\\0\\0\\0\\-1".into(),
        };
        assert_eq!(mixed.kind(), ErrorKind::InconsistentSeries);
        assert_eq!(SeriesError::SingularFrame.kind(), ErrorKind::MalformedMetadata);
        assert_eq!(SeriesError::EmptySeries.kind(), ErrorKind::EmptySeries);

        let io = SeriesError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
