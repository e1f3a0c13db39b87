//! Contribution (screen-size) culling.
//!
//! An object of radius `r` at distance `d` covers roughly
//! `pixels = screen_height * (2r / d) / fov_y`. Rather than computing that per
//! object, a threshold is precomputed once per frame:
//!
//! ```text
//!   min_angle = min_pixels * fov_y / screen_height
//!   threshold = (min_angle / 2)^2
//! ```
//!
//! and an object is rejected when `r^2 < |center - camera|^2 * threshold`.
//! No square roots or trigonometry happen per object.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

/// Default vertical field of view assumed when none is known.
pub const DEFAULT_FOV_Y: f32 = FRAC_PI_2;

/// Objects smaller than this many pixels are rejected by default.
pub const DEFAULT_MIN_PIXELS: f32 = 2.0;

/// Precomputes the per-frame contribution threshold.
#[must_use]
pub fn contribution_cull_threshold(resolution_y: f32, fov_y: f32, min_pixels: f32) -> f32 {
    let min_angle = min_pixels * fov_y / resolution_y;
    min_angle * min_angle * 0.25
}

/// Returns `true` when the sphere projects smaller than the threshold allows.
#[inline]
#[must_use]
pub fn contribution_cull(camera: Vec3, threshold: f32, center: Vec3, radius: f32) -> bool {
    radius * radius < center.distance_squared(camera) * threshold
}

/// Per-frame contribution culling state: camera position plus precomputed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ContributionCuller {
    pub camera: Vec3,
    pub threshold: f32,
}

impl ContributionCuller {
    #[must_use]
    pub fn new(camera: Vec3, resolution_y: f32, fov_y: f32, min_pixels: f32) -> Self {
        Self {
            camera,
            threshold: contribution_cull_threshold(resolution_y, fov_y, min_pixels),
        }
    }

    #[inline]
    #[must_use]
    pub fn cull(&self, center: Vec3, radius: f32) -> bool {
        contribution_cull(self.camera, self.threshold, center, radius)
    }

    /// Squared-radius variant of [`cull`](Self::cull).
    #[inline]
    #[must_use]
    pub fn cull_squared(&self, center: Vec3, radius_squared: f32) -> bool {
        radius_squared < center.distance_squared(self.camera) * self.threshold
    }
}

impl Default for ContributionCuller {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 1080.0, DEFAULT_FOV_Y, DEFAULT_MIN_PIXELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_matches_pixel_estimate() {
        // 1000px tall, 90 degree fov, 2px minimum.
        let threshold = contribution_cull_threshold(1000.0, FRAC_PI_2, 2.0);
        let min_angle = 2.0 * FRAC_PI_2 / 1000.0;
        assert!((threshold - min_angle * min_angle / 4.0).abs() < 1e-12);
    }

    #[test]
    fn distant_small_objects_are_rejected() {
        let culler = ContributionCuller::new(Vec3::ZERO, 1000.0, FRAC_PI_2, 2.0);

        assert!(!culler.cull(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(culler.cull(Vec3::new(0.0, 0.0, -10_000.0), 0.1));
        assert_eq!(
            culler.cull(Vec3::new(0.0, 0.0, -500.0), 0.5),
            culler.cull_squared(Vec3::new(0.0, 0.0, -500.0), 0.25)
        );
    }
}
