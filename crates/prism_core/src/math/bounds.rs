//! Axis-aligned bounding boxes and query shapes.
//!
//! Every shape the spatial tree can be queried with implements
//! [`QueryShape`], classifying a box as fully outside, straddling, or fully
//! inside the shape. The tree relies on `In` to stop per-object testing for a
//! whole subtree.

use std::fmt;

use glam::Vec3;

/// Result of classifying a box against a query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// The box lies entirely outside the shape.
    Out,
    /// The box straddles the shape boundary (or containment is unknown).
    Intersect,
    /// The box lies entirely inside the shape.
    In,
}

/// A shape the spatial tree can be queried with.
pub trait QueryShape {
    fn classify(&self, bounds: &BoundingBox) -> Intersection;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl BoundingBox {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The box tightly enclosing a sphere.
    #[must_use]
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        let r = Vec3::splat(radius.abs());
        Self {
            min: center - r,
            max: center + r,
        }
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half of [`size`](Self::size).
    #[inline]
    #[must_use]
    pub fn extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Radius of the bounding sphere around the box center.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grows this box in place to enclose `other`.
    pub fn union_with(&mut self, other: &BoundingBox) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Closed-interval overlap test; touching faces count as intersecting.
    #[must_use]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Returns `true` when `other` lies entirely within this box.
    #[must_use]
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min ({:.3}, {:.3}, {:.3}) max ({:.3}, {:.3}, {:.3})",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}

impl QueryShape for BoundingBox {
    fn classify(&self, bounds: &BoundingBox) -> Intersection {
        if !self.intersects(bounds) {
            Intersection::Out
        } else if self.contains(bounds) {
            Intersection::In
        } else {
            Intersection::Intersect
        }
    }
}

/// A shape that contains everything. Querying with it returns every object.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntersectAlways;

impl QueryShape for IntersectAlways {
    fn classify(&self, _bounds: &BoundingBox) -> Intersection {
        Intersection::In
    }
}

/// A finite line segment starting at `origin` and running `length` along `direction`.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// Expected to be normalized.
    pub direction: Vec3,
    pub length: f32,
}

impl Ray {
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3, length: f32) -> Self {
        Self {
            origin,
            direction,
            length,
        }
    }
}

impl QueryShape for Ray {
    /// Separating-axis test of the segment against the box.
    /// Segments never fully contain a box, so the result is `Out` or `Intersect`.
    fn classify(&self, bounds: &BoundingBox) -> Intersection {
        let half_segment = self.direction * (0.5 * self.length);
        let segment_center = self.origin + half_segment;
        let diff = segment_center - bounds.center();
        let extent = bounds.extent();

        let abs_half = half_segment.abs();
        if diff.abs().cmpgt(extent + abs_half).any() {
            return Intersection::Out;
        }

        let cross = half_segment.cross(diff).abs();
        let limits = Vec3::new(
            extent.y * abs_half.z + extent.z * abs_half.y,
            extent.z * abs_half.x + extent.x * abs_half.z,
            extent.x * abs_half.y + extent.y * abs_half.x,
        );
        if cross.cmpgt(limits).any() {
            return Intersection::Out;
        }

        Intersection::Intersect
    }
}
