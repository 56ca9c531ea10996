//! Mathematical utilities and data structures

pub mod aabb;
pub mod ray;

pub use aabb::Aabb;
pub use ray::{Ray, RayBoxHit};

use crate::core::types::{UP, Vec3};

/// Project a vector onto the horizontal plane and normalize it.
///
/// Returns zero for vertical or zero-length input.
pub fn horizontal_direction(v: Vec3) -> Vec3 {
    (v - UP * v.dot(UP)).normalize_or_zero()
}

/// Horizontal unit vector perpendicular to `v`, to its right when looking along `v`.
///
/// Sloped inputs still yield a level perpendicular. A vertical input has no
/// heading, so the world X axis is returned.
pub fn horizontal_perpendicular(v: Vec3) -> Vec3 {
    let flat = horizontal_direction(v);
    if flat == Vec3::ZERO {
        return Vec3::X;
    }
    flat.cross(UP).normalize()
}

/// Rotate the horizontal part of `v` about the up axis, keeping its vertical part.
pub fn rotate_about_up(v: Vec3, degrees: f32) -> Vec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec3::new(v.x * cos + v.z * sin, v.y, -v.x * sin + v.z * cos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_perpendicular_is_level_and_orthogonal() {
        let dir = Vec3::new(1.0, 0.5, 0.0).normalize();
        let perp = horizontal_perpendicular(dir);
        assert!(perp.y.abs() < 1e-6);
        assert!(perp.dot(horizontal_direction(dir)).abs() < 1e-6);
        assert!((perp.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_perpendicular_of_vertical() {
        assert_eq!(horizontal_perpendicular(Vec3::Y), Vec3::X);
    }

    #[test]
    fn test_rotate_about_up() {
        let r = rotate_about_up(Vec3::X, 90.0);
        assert!((r - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);

        let r = rotate_about_up(Vec3::new(1.0, 2.0, 0.0), 45.0);
        assert!((r.y - 2.0).abs() < 1e-6);
        assert!((Vec3::new(r.x, 0.0, r.z).length() - 1.0).abs() < 1e-5);
    }
}
