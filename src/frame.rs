use nalgebra::{Matrix4, Vector3, Vector4};

use crate::{attribute::parse_float_vector, error::SeriesError, metadata::Tag};

/// Below this cross product norm the two orientation vectors are treated as
/// parallel.
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Below this absolute determinant a frame is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-9;

fn parse_exact<const N: usize>(tag: Tag, text: &str) -> Result<[f64; N], SeriesError> {
    let values = parse_float_vector(text)?;
    let found = values.len();
    values
        .try_into()
        .map_err(|_| SeriesError::MalformedAttribute {
            tag,
            expected: N,
            found,
        })
}

/// World coordinate of a slice's first transmitted pixel (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePosition(pub [f64; 3]);

impl SlicePosition {
    /// Parse an `ImagePositionPatient` value, which must hold exactly three
    /// numbers.
    pub fn from_attribute(text: &str) -> Result<Self, SeriesError> {
        parse_exact(Tag::ImagePositionPatient, text).map(Self)
    }

    pub fn to_homogeneous(&self) -> Vector4<f64> {
        let [x, y, z] = self.0;
        Vector4::new(x, y, z, 1.0)
    }
}

/// Row and column direction cosines of a slice.
///
/// The two vectors are taken as given; unit length and orthogonality are not
/// re-checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceOrientation(pub [f64; 6]);

impl SliceOrientation {
    /// Parse an `ImageOrientationPatient` value, which must hold exactly six
    /// numbers.
    pub fn from_attribute(text: &str) -> Result<Self, SeriesError> {
        parse_exact(Tag::ImageOrientationPatient, text).map(Self)
    }

    pub fn row(&self) -> Vector3<f64> {
        Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn column(&self) -> Vector3<f64> {
        Vector3::new(self.0[3], self.0[4], self.0[5])
    }

    /// Unit normal of the slice plane, `row x column`.
    pub fn normal(&self) -> Result<Vector3<f64>, SeriesError> {
        let cross = self.row().cross(&self.column());
        if cross.norm() < DEGENERATE_EPSILON {
            return Err(SeriesError::DegenerateOrientation);
        }
        Ok(cross.normalize())
    }
}

/// Affine transform between a slice-local frame and world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    matrix: Matrix4<f64>,
}

impl ReferenceFrame {
    /// Build the frame anchored at `position` whose columns are the row axis,
    /// the column axis, the slice normal and the translation. It maps local
    /// coordinates into world coordinates.
    pub fn new(
        orientation: &SliceOrientation,
        position: &SlicePosition,
    ) -> Result<Self, SeriesError> {
        let row = orientation.row();
        let column = orientation.column();
        let normal = orientation.normal()?;

        let matrix = Matrix4::from_columns(&[
            row.push(0.0),
            column.push(0.0),
            normal.push(0.0),
            position.to_homogeneous(),
        ]);
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// The inverse transform. For a frame built by [`ReferenceFrame::new`]
    /// this maps world coordinates into the slice-local frame.
    pub fn invert(&self) -> Result<Self, SeriesError> {
        if self.matrix.determinant().abs() < SINGULAR_EPSILON {
            return Err(SeriesError::SingularFrame);
        }
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or(SeriesError::SingularFrame)
    }

    pub fn transform(&self, point: &Vector4<f64>) -> Vector4<f64> {
        self.matrix * point
    }
}
