mod service;

pub use service::{FollowUpAnswerResult, FollowUpService};
