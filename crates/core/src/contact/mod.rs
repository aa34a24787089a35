//! Contact model

mod model;

pub use model::Contact;
