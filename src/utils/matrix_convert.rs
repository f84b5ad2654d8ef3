//! Matrix conversion utilities between ndarray and faer.
//!
//! The public API speaks `ndarray`; the normal-equation solve inside the
//! Levenberg-Marquardt step works on `faer` matrices.

use faer::Mat;
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a faer Mat.
///
/// Note: ndarray is row-major by default, faer is column-major, so the copy is
/// element-wise.
pub fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a faer Mat to an ndarray Array2.
pub fn faer_to_ndarray(mat: &Mat<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Convert an ndarray Array1 to a single-column faer Mat, the right-hand side
/// shape the faer solvers work in place on.
pub fn ndarray_vec_to_faer(arr: &Array1<f64>) -> Mat<f64> {
    Mat::from_fn(arr.len(), 1, |i, _| arr[i])
}

/// Convert the first column of a faer Mat to an ndarray Array1.
pub fn faer_vec_to_ndarray(col: &Mat<f64>) -> Array1<f64> {
    Array1::from_shape_fn(col.nrows(), |i| col[(i, 0)])
}
