pub mod catalog;
pub mod types;

pub use catalog::RouteCatalog;
pub use types::{Route, Stop};
