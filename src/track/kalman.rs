//! Constant-velocity Kalman filter over box center and area.
//!
//! State `x = [cx, cy, s, r, dcx, dcy, ds]` (s = area, r = aspect ratio held
//! constant). Observation `z = [cx, cy, s, r]`.

use anyhow::{anyhow, Result};
use nalgebra::{SMatrix, SVector};

use super::bbox::BoundingBox;

pub const DIM_X: usize = 7;
pub const DIM_Z: usize = 4;

type StateVector = SVector<f64, DIM_X>;
type StateMatrix = SMatrix<f64, DIM_X, DIM_X>;
type MeasVector = SVector<f64, DIM_Z>;
type MeasMatrix = SMatrix<f64, DIM_Z, DIM_Z>;
type ObsMatrix = SMatrix<f64, DIM_Z, DIM_X>;

/// Noise configuration. Defaults follow the usual SORT setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KalmanNoise {
    /// Diagonal of R, uncertainty of (cx, cy, s, r) measurements.
    pub measurement: [f64; DIM_Z],
    /// Diagonal of Q, uncertainty of each state component per step.
    pub process: [f64; DIM_X],
    /// Diagonal of the initial covariance P.
    pub initial: [f64; DIM_X],
}

impl Default for KalmanNoise {
    fn default() -> Self {
        Self {
            measurement: [1.0, 1.0, 10.0, 10.0],
            process: [1.0, 1.0, 1.0, 1.0, 0.01, 0.01, 0.0001],
            initial: [10.0, 10.0, 10.0, 10.0, 10_000.0, 10_000.0, 10_000.0],
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoxKalmanFilter {
    x: StateVector,
    p: StateMatrix,
    f: StateMatrix,
    h: ObsMatrix,
    r: MeasMatrix,
    q: StateMatrix,
}

impl BoxKalmanFilter {
    pub fn new(bbox: &BoundingBox, noise: &KalmanNoise) -> Self {
        let z = bbox.to_z();
        let x = StateVector::from_row_slice(&[z[0], z[1], z[2], z[3], 0.0, 0.0, 0.0]);

        #[rustfmt::skip]
        let f = StateMatrix::from_row_slice(&[
            1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ]);

        #[rustfmt::skip]
        let h = ObsMatrix::from_row_slice(&[
            1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
        ]);

        Self {
            x,
            p: StateMatrix::from_diagonal(&StateVector::from_row_slice(&noise.initial)),
            f,
            h,
            r: MeasMatrix::from_diagonal(&MeasVector::from_row_slice(&noise.measurement)),
            q: StateMatrix::from_diagonal(&StateVector::from_row_slice(&noise.process)),
        }
    }

    /// Advance one step. Area velocity is zeroed first when it would drive
    /// the area non-positive.
    pub fn predict(&mut self) {
        if self.x[6] + self.x[2] <= 0.0 {
            self.x[6] = 0.0;
        }
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    /// Correct the state toward an observed box.
    pub fn update(&mut self, bbox: &BoundingBox) -> Result<()> {
        let z = MeasVector::from_row_slice(&bbox.to_z());
        let y = z - self.h * self.x;
        let s = self.h * self.p * self.h.transpose() + self.r;
        let s_inv = s
            .try_inverse()
            .ok_or_else(|| anyhow!("innovation covariance is singular"))?;
        let k = self.p * self.h.transpose() * s_inv;
        self.x += k * y;
        self.p = (StateMatrix::identity() - k * self.h) * self.p;
        Ok(())
    }

    /// Box implied by the current state estimate.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_z(&[self.x[0], self.x[1], self.x[2], self.x[3]])
    }

    pub fn state(&self) -> &StateVector {
        &self.x
    }

    /// Velocity of the box center in pixels per frame.
    pub fn velocity(&self) -> (f64, f64) {
        (self.x[4], self.x[5])
    }
}
