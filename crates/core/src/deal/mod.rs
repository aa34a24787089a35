//! Deal model and lifecycle transitions

mod lifecycle;
mod model;

pub use lifecycle::{plan_update, DealPatch, TransitionOutcome};
pub use model::{Deal, DealStage, DealStatus};
