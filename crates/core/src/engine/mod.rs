//! Adaptive assessment rules: per-topic difficulty, topic order, question
//! de-duplication, final classification and follow-up test construction.

mod adaptive;
pub mod classifier;
mod dedup;
pub mod follow_up;
mod traversal;

pub use adaptive::{Step, TopicState};
pub use classifier::{classify, topic_outcome};
pub use dedup::{Selection, SelectionKind, UsedQuestions};
pub use follow_up::{FOLLOW_UP_LENGTH, FollowUpBuildError};
pub use traversal::Advance;
