//! Data types shared across the comparison pipeline.

mod core;
mod dom;
mod results;

pub use self::core::{BoundingBox, RegionDescriptor, RegionImage, RegionKind, Side, UrlPair, Viewport};
pub use self::dom::{Navigation, OutlineNode, PageOutline};
pub use self::results::{
    ComponentResult, MediaComparison, PageOutcome, PageResult, RedirectMismatch, TaskFailure,
};
