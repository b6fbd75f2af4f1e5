mod client;
mod config;
mod organization_repository;
mod package_repository;
mod schema;

pub use client::*;
pub use config::*;
pub use organization_repository::*;
pub use package_repository::*;
pub use schema::*;
