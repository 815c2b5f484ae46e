//! Terrain collaborator.
//!
//! The core never owns terrain data; it asks for ground height when moving
//! actors and for line of sight when detecting threats.

use warband_common::Vec3;

/// Terrain queries used by movement and perception.
pub trait Terrain {
    /// Ground height at a ground-plane position.
    fn height_at(&self, x: f32, z: f32) -> f32;

    /// Whether `to` is visible from `from`.
    fn has_line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        true
    }
}

/// Flat ground at a fixed height.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain {
    height: f32,
    blocked: bool,
}

impl FlatTerrain {
    /// Flat terrain at the given height with clear sight lines.
    #[must_use]
    pub const fn new(height: f32) -> Self {
        Self {
            height,
            blocked: false,
        }
    }

    /// Sets whether sight lines are clear.
    #[must_use]
    pub const fn with_line_of_sight(mut self, clear: bool) -> Self {
        self.blocked = !clear;
        self
    }
}

impl Terrain for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.height
    }

    fn has_line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        !self.blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_terrain() {
        let terrain = FlatTerrain::new(2.5);
        assert_eq!(terrain.height_at(100.0, -40.0), 2.5);
        assert!(terrain.has_line_of_sight(Vec3::ZERO, Vec3::ONE));
        assert!(!terrain
            .with_line_of_sight(false)
            .has_line_of_sight(Vec3::ZERO, Vec3::ONE));
    }
}
