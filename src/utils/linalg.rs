//! Small dense linear algebra used by the constraint group solver.

use glam::{DMat3, DVec3};

use crate::error::{PhysicsError, Result};

/// Row-major square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    size: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    /// Adds a 3x3 block whose top-left corner is at `(3 * block_row, 3 * block_col)`.
    pub fn add_block(&mut self, block_row: usize, block_col: usize, block: DMat3) {
        for c in 0..3 {
            let column = block.col(c);
            for r in 0..3 {
                let (row, col) = (block_row * 3 + r, block_col * 3 + c);
                self.data[row * self.size + col] += column[r];
            }
        }
    }

    /// LU factorisation with partial pivoting.
    pub fn factorize(mut self) -> Result<LuFactorization> {
        let n = self.size;
        let mut pivots: Vec<usize> = (0..n).collect();
        let scale = self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let tolerance = scale.max(1.0) * 1e-12;

        for k in 0..n {
            let (pivot_row, pivot_value) = (k..n)
                .map(|r| (r, self.get(r, k).abs()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot_value <= tolerance {
                return Err(PhysicsError::SingularSystem { size: n });
            }
            if pivot_row != k {
                for c in 0..n {
                    self.data.swap(k * n + c, pivot_row * n + c);
                }
                pivots.swap(k, pivot_row);
            }
            let diag = self.get(k, k);
            for r in (k + 1)..n {
                let factor = self.get(r, k) / diag;
                self.set(r, k, factor);
                if factor == 0.0 {
                    continue;
                }
                for c in (k + 1)..n {
                    let v = self.get(r, c) - factor * self.get(k, c);
                    self.set(r, c, v);
                }
            }
        }

        Ok(LuFactorization { lu: self, pivots })
    }
}

/// Factorised matrix that can solve for several right hand sides.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    lu: DenseMatrix,
    pivots: Vec<usize>,
}

impl LuFactorization {
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.lu.size;
        debug_assert_eq!(rhs.len(), n);
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| rhs[p]).collect();

        for r in 0..n {
            let mut sum = x[r];
            for c in 0..r {
                sum -= self.lu.get(r, c) * x[c];
            }
            x[r] = sum;
        }
        for r in (0..n).rev() {
            let mut sum = x[r];
            for c in (r + 1)..n {
                sum -= self.lu.get(r, c) * x[c];
            }
            x[r] = sum / self.lu.get(r, r);
        }
        x
    }

    /// Solves a system whose right hand side is a list of 3-vectors.
    pub fn solve_vec3(&self, rhs: &[DVec3]) -> Vec<DVec3> {
        let flat: Vec<f64> = rhs.iter().flat_map(|v| v.to_array()).collect();
        self.solve(&flat)
            .chunks_exact(3)
            .map(|c| DVec3::new(c[0], c[1], c[2]))
            .collect()
    }
}
