pub mod median;
pub mod store;

pub use median::median;
pub use store::{Registry, SampleStore, WindowPolicy};
