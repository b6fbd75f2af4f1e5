mod weight_store;
mod work_item_processor;

pub use weight_store::*;
pub use work_item_processor::*;
