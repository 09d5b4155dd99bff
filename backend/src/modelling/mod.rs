//! Modelling helpers
//!
//! Building blocks for model authors. None of these are used by the engine
//! itself.
//!
//! - [`DiscreteDist`]: integer-valued distributions (demand, lead times)
//! - [`EventHeap`]: min-heap of scheduled events
//! - [`ValueTable`]: fixed-point iteration over a bounded integer domain

mod discrete_dist;
mod event_heap;
mod value_table;

pub use discrete_dist::DiscreteDist;
pub use event_heap::EventHeap;
pub use value_table::{FixedPointConfig, ValueTable, ValueView};
