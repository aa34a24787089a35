//! Activity timeline model

mod model;

pub use model::{Activity, ActivityKind};
