//! Perspective transform between camera space and display space.
//!
//! Four point pairs determine the eight degrees of freedom of a homography
//! exactly, so the transform is found by solving the 8x8 linear system in
//! projective coordinates with `H[2,2] = 1`.

use crate::error::{Result, SandboxError};
use nalgebra::{Matrix3, Point2, SMatrix, SVector};

/// Smallest triangle area (in square pixels) treated as non-collinear.
const COLLINEAR_EPSILON: f64 = 1e-6;

/// Four source points matched against four destination points.
///
/// Both lists follow the same order: top-left, top-right, bottom-right,
/// bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondencePair {
    source: [Point2<f64>; 4],
    destination: [Point2<f64>; 4],
}

impl CorrespondencePair {
    pub fn new(source: [Point2<f64>; 4], destination: [Point2<f64>; 4]) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Build from point lists, which must hold exactly four points each.
    pub fn from_slices(source: &[Point2<f64>], destination: &[Point2<f64>]) -> Result<Self> {
        let source: [Point2<f64>; 4] = source.try_into().map_err(|_| {
            SandboxError::InvalidCorrespondence(format!(
                "Expected 4 source points, got {}",
                source.len()
            ))
        })?;
        let destination: [Point2<f64>; 4] = destination.try_into().map_err(|_| {
            SandboxError::InvalidCorrespondence(format!(
                "Expected 4 destination points, got {}",
                destination.len()
            ))
        })?;
        Ok(Self::new(source, destination))
    }

    pub fn source(&self) -> &[Point2<f64>; 4] {
        &self.source
    }

    pub fn destination(&self) -> &[Point2<f64>; 4] {
        &self.destination
    }
}

/// Projective mapping from camera space into display space.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Transform {
    /// Fit the transform mapping every source point onto its destination.
    pub fn build(pair: &CorrespondencePair) -> Result<Self> {
        ensure_not_collinear(pair.source(), "source")?;
        ensure_not_collinear(pair.destination(), "destination")?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (src, dst)) in pair.source.iter().zip(pair.destination.iter()).enumerate() {
            let (x, y) = (src.x, src.y);
            let (u, v) = (dst.x, dst.y);

            a[(i, 0)] = x;
            a[(i, 1)] = y;
            a[(i, 2)] = 1.0;
            a[(i, 6)] = -x * u;
            a[(i, 7)] = -y * u;
            b[i] = u;

            a[(i + 4, 3)] = x;
            a[(i + 4, 4)] = y;
            a[(i + 4, 5)] = 1.0;
            a[(i + 4, 6)] = -x * v;
            a[(i + 4, 7)] = -y * v;
            b[i + 4] = v;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            SandboxError::InvalidCorrespondence("Perspective system is singular".to_string())
        })?;

        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        let transform = Self::from_matrix(matrix)?;

        log::info!(
            "Perspective transform built, reprojection error {:.4}px",
            transform.reprojection_error(pair)
        );

        Ok(transform)
    }

    /// Wrap an existing 3x3 matrix.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self> {
        let inverse = matrix.try_inverse().ok_or_else(|| {
            SandboxError::InvalidCorrespondence("Matrix is singular, cannot invert".to_string())
        })?;
        Ok(Self { matrix, inverse })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            inverse: Matrix3::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse_matrix(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Map a camera point into display space.
    pub fn transform_point(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        apply_matrix(&self.matrix, point.x, point.y).map(|(x, y)| Point2::new(x, y))
    }

    /// Map a display point back into camera space.
    pub fn inverse_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        apply_matrix(&self.inverse, x, y)
    }

    /// Mean distance between mapped source points and their destinations.
    pub fn reprojection_error(&self, pair: &CorrespondencePair) -> f64 {
        let mut total = 0.0;
        let mut count = 0;

        for (src, dst) in pair.source().iter().zip(pair.destination().iter()) {
            if let Some(mapped) = self.transform_point(src) {
                total += (mapped - *dst).norm();
                count += 1;
            }
        }

        if count > 0 {
            total / count as f64
        } else {
            0.0
        }
    }
}

/// Apply a homography to a point, `None` at the line at infinity.
#[inline]
pub(crate) fn apply_matrix(h: &Matrix3<f64>, x: f64, y: f64) -> Option<(f64, f64)> {
    let w = h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)];
    if w.abs() < 1e-10 {
        return None;
    }
    let tx = (h[(0, 0)] * x + h[(0, 1)] * y + h[(0, 2)]) / w;
    let ty = (h[(1, 0)] * x + h[(1, 1)] * y + h[(1, 2)]) / w;
    Some((tx, ty))
}

fn ensure_not_collinear(points: &[Point2<f64>; 4], label: &str) -> Result<()> {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];

    for [i, j, k] in TRIPLES {
        let (p0, p1, p2) = (points[i], points[j], points[k]);
        let area = (p1.x - p0.x) * (p2.y - p0.y) - (p1.y - p0.y) * (p2.x - p0.x);
        if area.abs() < COLLINEAR_EPSILON {
            return Err(SandboxError::InvalidCorrespondence(format!(
                "{} points {}, {} and {} are collinear",
                label, i, j, k
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_pair() -> CorrespondencePair {
        CorrespondencePair::new(
            [
                Point2::new(102.0, 57.0),
                Point2::new(531.0, 80.0),
                Point2::new(560.0, 440.0),
                Point2::new(75.0, 410.0),
            ],
            [
                Point2::new(0.0, 0.0),
                Point2::new(1024.0, 0.0),
                Point2::new(1024.0, 768.0),
                Point2::new(0.0, 768.0),
            ],
        )
    }

    #[test]
    fn test_identity_transform() {
        let identity = Transform::identity();
        let p = identity.transform_point(&Point2::new(100.0, 200.0)).unwrap();
        assert!((p.x - 100.0).abs() < 1e-9);
        assert!((p.y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_corners_round_trip() {
        let pair = skewed_pair();
        let transform = Transform::build(&pair).unwrap();

        for (src, dst) in pair.source().iter().zip(pair.destination().iter()) {
            let mapped = transform.transform_point(src).unwrap();
            assert!((mapped.x - dst.x).abs() < 1e-6, "{:?} -> {:?}", src, mapped);
            assert!((mapped.y - dst.y).abs() < 1e-6, "{:?} -> {:?}", src, mapped);

            let (bx, by) = transform.inverse_point(dst.x, dst.y).unwrap();
            assert!((bx - src.x).abs() < 1e-6);
            assert!((by - src.y).abs() < 1e-6);
        }

        assert!(transform.reprojection_error(&pair) < 1e-6);
    }

    #[test]
    fn test_scale_transform() {
        let pair = CorrespondencePair::new(
            [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            [
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 3.0),
                Point2::new(0.0, 3.0),
            ],
        );
        let transform = Transform::build(&pair).unwrap();
        let m = transform.matrix();
        assert!((m[(0, 0)] - 2.0).abs() < 1e-9);
        assert!((m[(1, 1)] - 3.0).abs() < 1e-9);
        assert!(m[(2, 0)].abs() < 1e-9);
    }

    #[test]
    fn test_collinear_points_rejected() {
        let pair = CorrespondencePair::new(
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(20.0, 20.0),
                Point2::new(0.0, 30.0),
            ],
            [
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
            ],
        );
        assert!(matches!(
            Transform::build(&pair),
            Err(SandboxError::InvalidCorrespondence(_))
        ));
    }

    #[test]
    fn test_wrong_point_count_rejected() {
        let three = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
        ];
        let four = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(CorrespondencePair::from_slices(&three, &four).is_err());
        assert!(CorrespondencePair::from_slices(&four, &three).is_err());
        assert!(CorrespondencePair::from_slices(&four, &four).is_ok());
    }

    #[test]
    fn test_matrix_invert() {
        let matrix = Matrix3::new(2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 1.0);
        let transform = Transform::from_matrix(matrix).unwrap();
        let inv = transform.inverse_matrix();
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-9);
        assert!((inv[(1, 1)] - 1.0 / 3.0).abs() < 1e-9);

        assert!(Transform::from_matrix(Matrix3::zeros()).is_err());
    }
}
