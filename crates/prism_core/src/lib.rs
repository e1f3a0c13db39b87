//! Prism Core
//!
//! Foundational types shared by every Prism crate:
//!
//! - [`interner`]: string ↔ [`NameId`] interning used instead of string comparison
//! - [`errors`]: the [`PrismError`] enum and [`Result`] alias
//! - [`logging`]: one-shot `env_logger` initialization for binaries and tests
//! - [`math`]: bounding boxes, frustum planes and contribution culling
//! - [`spatial`]: the bounding-volume tree over static geometry

pub mod errors;
pub mod interner;
pub mod logging;
pub mod math;
pub mod spatial;

pub use errors::{PrismError, Result};
pub use interner::{NameId, NameMap};
pub use math::{BoundingBox, Frustum, Intersection, QueryShape};
pub use spatial::AabbTree;
