mod client;
mod consumer;
mod object_store;
mod traits;

pub use client::*;
pub use consumer::*;
pub use object_store::*;
pub use traits::*;
