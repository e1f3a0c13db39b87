//! Spatial partitioning.
//!
//! [`AabbTree`] is a binary bounding-volume hierarchy over static geometry.
//! It is filled once per scene load, built with [`AabbTree::optimize`], and
//! queried every frame with a [`QueryShape`](crate::math::QueryShape).

mod tree;

pub use tree::{AabbTree, NodeView, TreeStats};
