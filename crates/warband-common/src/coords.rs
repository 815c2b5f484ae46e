//! Planar geometry helpers.
//!
//! Actors live in 3-D space but move and measure distances on the ground
//! plane (X/Z); the Y axis is owned by the terrain collaborator.

pub use glam::Vec3;

/// Distance between two points on the ground plane, ignoring height.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Normalized ground-plane direction from `from` to `to`.
///
/// Returns `Vec3::ZERO` when the points coincide.
#[must_use]
pub fn planar_direction(from: Vec3, to: Vec3) -> Vec3 {
    let delta = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    let len = delta.length();
    if len < 0.0001 {
        Vec3::ZERO
    } else {
        delta / len
    }
}

/// Yaw angle (radians) that faces from `from` toward `to`.
#[must_use]
pub fn yaw_toward(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dz = to.z - from.z;
    dx.atan2(dz)
}

/// Unit ground-plane vector for a yaw angle.
#[must_use]
pub fn yaw_vector(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Point on a ground-plane circle around `center`.
#[must_use]
pub fn point_on_circle(center: Vec3, radius: f32, angle: f32) -> Vec3 {
    Vec3::new(
        center.x + angle.cos() * radius,
        center.y,
        center.z + angle.sin() * radius,
    )
}

/// Ground-plane perpendicular of a direction (rotated 90 degrees clockwise).
#[must_use]
pub fn perpendicular(dir: Vec3) -> Vec3 {
    Vec3::new(dir.z, 0.0, -dir.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_direction_degenerate() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(planar_direction(p, p), Vec3::ZERO);
    }

    #[test]
    fn test_yaw_roundtrip() {
        let from = Vec3::ZERO;
        let to = Vec3::new(5.0, 0.0, 5.0);
        let dir = yaw_vector(yaw_toward(from, to));
        let expected = planar_direction(from, to);
        assert!((dir - expected).length() < 0.001);
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        let dir = planar_direction(Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0));
        assert!(dir.dot(perpendicular(dir)).abs() < 0.0001);
    }

    proptest! {
        #[test]
        fn planar_direction_is_unit_or_zero(
            ax in -1000.0f32..1000.0, az in -1000.0f32..1000.0,
            bx in -1000.0f32..1000.0, bz in -1000.0f32..1000.0,
        ) {
            let d = planar_direction(Vec3::new(ax, 0.0, az), Vec3::new(bx, 5.0, bz));
            let len = d.length();
            prop_assert!(len == 0.0 || (len - 1.0).abs() < 0.001);
            prop_assert_eq!(d.y, 0.0);
        }
    }
}
