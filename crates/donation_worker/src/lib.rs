pub mod domain;
pub mod donation_worker;
pub mod nats;

pub use domain::*;
pub use donation_worker::*;
pub use nats::*;
