//! Task model

mod model;

pub use model::Task;
