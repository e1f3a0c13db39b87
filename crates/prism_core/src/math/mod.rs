//! Visibility math.
//!
//! - [`bounds`]: axis-aligned boxes and the [`QueryShape`] classification used by the spatial tree
//! - [`frustum`]: six-plane frustum extraction and sphere/box culling
//! - [`contribution`]: screen-size (contribution) culling

pub mod bounds;
pub mod contribution;
pub mod frustum;

pub use bounds::{BoundingBox, IntersectAlways, Intersection, QueryShape, Ray};
pub use contribution::{ContributionCuller, contribution_cull, contribution_cull_threshold};
pub use frustum::Frustum;
