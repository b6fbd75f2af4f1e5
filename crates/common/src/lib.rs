pub mod domain;
pub mod nats;
pub mod postgres;
pub mod telemetry;

pub use nats::*;
pub use postgres::*;
