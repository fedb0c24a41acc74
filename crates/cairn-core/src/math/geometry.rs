// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides the axis-aligned bounding box used for element extents and culling.

use super::{Vec3, EPSILON};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Elements publish their world-space extents as an AABB; the GPU mirror stores
/// the `min` and `max` corners directly.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb`, neutral for merging.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corners given in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a new `Aabb` from a center point and its half-extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = Vec3::new(
            half_extents.x.abs(),
            half_extents.y.abs(),
            half_extents.z.abs(),
        );
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Calculates the center point of the `Aabb`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculates the full size of the `Aabb`.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Checks if `min <= max` on all axes.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Checks if this `Aabb` overlaps another one. Touching boxes intersect.
    #[inline]
    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        (self.min.x <= other.max.x + EPSILON && self.max.x + EPSILON >= other.min.x)
            && (self.min.y <= other.max.y + EPSILON && self.max.y + EPSILON >= other.min.y)
            && (self.min.z <= other.max.z + EPSILON && self.max.z + EPSILON >= other.min.z)
    }

    /// Creates a new `Aabb` enclosing both boxes.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::from_min_max(Vec3::ZERO, Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_min_max_orders_corners() {
        let aabb = Aabb::from_min_max(Vec3::new(1.0, -1.0, 2.0), Vec3::new(-1.0, 1.0, 0.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 1.0, 2.0));
        assert!(aabb.is_valid());
    }

    #[test]
    fn test_intersects_touching_boxes() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = Aabb::from_min_max(Vec3::splat(3.0), Vec3::splat(4.0));
        assert!(a.intersects_aabb(&b));
        assert!(!a.intersects_aabb(&c));
    }

    #[test]
    fn test_merge_with_invalid_is_identity() {
        let a = Aabb::from_center_half_extents(Vec3::splat(2.0), Vec3::new(-1.0, 1.0, 1.0));
        assert_eq!(Aabb::INVALID.merge(&a), a);
        assert_eq!(a.center(), Vec3::splat(2.0));
        assert_eq!(a.size(), Vec3::splat(2.0));
    }
}
