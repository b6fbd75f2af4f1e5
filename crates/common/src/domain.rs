mod donation;
mod manifest;
mod organization;
mod package;
mod result;
mod weight_store;
mod work_item;

pub use donation::*;
pub use manifest::*;
pub use organization::*;
pub use package::*;
pub use result::*;
pub use weight_store::*;
pub use work_item::*;
