//! Ray type and operations

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for fast AABB intersection
    pub inv_direction: Vec3,
}

/// Entry point of a ray into a box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayBoxHit {
    /// Ray parameter of the entry point (0 when the origin is inside)
    pub t: f32,
    /// Outward normal of the face that was entered
    pub normal: Vec3,
    /// True when the origin already lies inside the box
    pub inside: bool,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(
                1.0 / direction.x,
                1.0 / direction.y,
                1.0 / direction.z,
            ),
        }
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab intersection that also reports the entry face normal.
    ///
    /// Axes the ray runs parallel to are handled by the infinities in
    /// `inv_direction`; a zero direction component inside the slab never limits `t`.
    pub fn hit_aabb(&self, aabb: &Aabb) -> Option<RayBoxHit> {
        if aabb.contains_point(self.origin) {
            return Some(RayBoxHit {
                t: 0.0,
                normal: -self.direction.normalize_or_zero(),
                inside: true,
            });
        }

        let t1 = (aabb.min - self.origin) * self.inv_direction;
        let t2 = (aabb.max - self.origin) * self.inv_direction;
        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_far = t_max.x.min(t_max.y).min(t_max.z);
        let (t_near, axis) = if t_min.x >= t_min.y && t_min.x >= t_min.z {
            (t_min.x, 0)
        } else if t_min.y >= t_min.z {
            (t_min.y, 1)
        } else {
            (t_min.z, 2)
        };

        if t_near.is_nan() || t_near > t_far || t_near < 0.0 {
            return None;
        }

        let mut normal = Vec3::ZERO;
        normal[axis] = -self.direction[axis].signum();
        Some(RayBoxHit { t: t_near, normal, inside: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(5.0), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_hit_aabb_reports_entry_normal() {
        let ray = Ray::new(Vec3::new(0.5, 0.5, -3.0), Vec3::Z);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let hit = ray.hit_aabb(&aabb).unwrap();
        assert!((hit.t - 3.0).abs() < 0.001);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0));
        assert!(!hit.inside);
    }

    #[test]
    fn test_hit_aabb_from_inside() {
        let ray = Ray::new(Vec3::splat(0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let hit = ray.hit_aabb(&aabb).unwrap();
        assert_eq!(hit.t, 0.0);
        assert!(hit.inside);
    }

    #[test]
    fn test_hit_aabb_behind_origin() {
        let ray = Ray::new(Vec3::new(2.0, 0.5, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(ray.hit_aabb(&aabb).is_none());
    }
}
