pub mod engine;
pub mod error;
pub mod model;
pub mod policy;
pub mod time;

pub use error::{Error, SessionStateError};
pub use policy::{AssessmentPolicy, PassRule, PolicyError};
pub use time::Clock;
