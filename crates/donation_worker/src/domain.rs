mod allocator;
mod distribution_service;
mod manifest_catalog;

pub use allocator::*;
pub use distribution_service::*;
pub use manifest_catalog::*;
