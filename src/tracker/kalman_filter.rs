//! Constant-velocity Kalman filter over `(cx, cy, aspect, height)` boxes.

use nalgebra::{Matrix4, SMatrix, SVector, Vector4};

/// 8-dim state: box measurement followed by its velocities.
pub type StateMean = SVector<f64, 8>;
pub type StateCovariance = SMatrix<f64, 8, 8>;
type Observation = SMatrix<f64, 4, 8>;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion: StateCovariance,
    observation: Observation,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion = StateCovariance::identity();
        for i in 0..4 {
            motion[(i, 4 + i)] = 1.0;
        }

        Self {
            motion,
            observation: Observation::identity(),
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a track from an unassociated measurement.
    pub fn initiate(&self, measurement: &Vector4<f64>) -> (StateMean, StateCovariance) {
        let mean = StateMean::from_column_slice(&[
            measurement[0],
            measurement[1],
            measurement[2],
            measurement[3],
            0.0,
            0.0,
            0.0,
            0.0,
        ]);

        let h = measurement[3];
        let pos = 2.0 * self.std_weight_position * h;
        let vel = 10.0 * self.std_weight_velocity * h;
        let covariance = diagonal([pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        (mean, covariance)
    }

    pub fn predict(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (StateMean, StateCovariance) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let vel = self.std_weight_velocity * h;
        let motion_cov = diagonal([pos, pos, 1e-2, pos, vel, vel, 1e-5, vel]);

        let mean = self.motion * mean;
        let covariance = self.motion * covariance * self.motion.transpose() + motion_cov;
        (mean, covariance)
    }

    /// Project the state into measurement space.
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (Vector4<f64>, Matrix4<f64>) {
        let h = mean[3];
        let pos = self.std_weight_position * h;
        let innovation_cov = diagonal([pos, pos, 1e-1, pos]);

        let projected_mean = self.observation * mean;
        let projected_cov =
            self.observation * covariance * self.observation.transpose() + innovation_cov;
        (projected_mean, projected_cov)
    }

    /// Correct the state with a new measurement.
    ///
    /// A singular innovation covariance leaves the state unchanged.
    pub fn update(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurement: &Vector4<f64>,
    ) -> (StateMean, StateCovariance) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let Some(projected_inv) = projected_cov.try_inverse() else {
            return (*mean, *covariance);
        };

        let gain = covariance * self.observation.transpose() * projected_inv;
        let innovation = measurement - projected_mean;

        let mean = mean + gain * innovation;
        let covariance = covariance - gain * projected_cov * gain.transpose();
        (mean, covariance)
    }
}

fn diagonal<const N: usize>(std: [f64; N]) -> SMatrix<f64, N, N> {
    SMatrix::<f64, N, N>::from_diagonal(&SVector::<f64, N>::from(std.map(|s| s * s)))
}
