//! Owned row-major `f32` matrix used for features, beliefs and energies.
//!
//! Row `i` always belongs to point `i`; columns are feature dimensions,
//! labels or filter channels depending on the caller. Rows are stored
//! contiguously (no stride padding) so a whole matrix can be handed to the
//! lattice as one flat slice.
use crate::error::CrfError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowMatrix {
    /// Number of rows (points)
    pub rows: usize,
    /// Number of values per row
    pub cols: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl RowMatrix {
    /// Construct a zero-initialized `rows × cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap an existing buffer, checking that its length matches the shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, CrfError> {
        if data.len() != rows * cols {
            return Err(CrfError::BufferLength {
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, CrfError> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CrfError::shape("from_rows", (1, cols), (1, row.len())));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Stack `self` on top of `other`; both must have the same column count.
    pub fn vstack(&self, other: &RowMatrix) -> Result<Self, CrfError> {
        if self.cols != other.cols {
            return Err(CrfError::FeatureDimension {
                expected: self.cols,
                found: other.cols,
            });
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Ok(Self {
            rows: self.rows + other.rows,
            cols: self.cols,
            data,
        })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, v: f32) {
        self.data[row * self.cols + col] = v;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Iterate over rows in order. Zero-column matrices yield nothing.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let rows = self.rows;
        self.data.chunks_exact_mut(self.cols.max(1)).take(rows)
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Reshape in place, zeroing the contents. Keeps the allocation when possible.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.clear();
        self.data.resize(rows * cols, 0.0);
    }

    /// Index of the largest entry of each row; ties resolve to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.rows()
            .map(|row| {
                let mut best = 0usize;
                for (j, &v) in row.iter().enumerate().skip(1) {
                    if v > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }

    pub(crate) fn ensure_shape(
        &self,
        context: &'static str,
        rows: usize,
        cols: usize,
    ) -> Result<(), CrfError> {
        if self.rows != rows || self.cols != cols {
            return Err(CrfError::shape(context, (rows, cols), self.shape()));
        }
        Ok(())
    }
}
