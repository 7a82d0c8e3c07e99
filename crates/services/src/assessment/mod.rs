mod service;
mod types;

pub use service::AdaptiveAssessmentService;
pub use types::{AnswerResult, NextAction};
