//! Core simulation vocabulary shared by every other module
//!
//! - **category**: state-machine phase markers (`StateCategory`)
//! - **static_info**: static description a model publishes about itself
//! - **error**: crate-wide error type

pub mod category;
pub mod error;
pub mod static_info;

pub use category::StateCategory;
pub use error::{SimError, SimResult};
pub use static_info::{HorizonType, StaticInfo};
