#![forbid(unsafe_code)]

pub mod app_services;
pub mod assessment;
pub mod error;
pub mod follow_up;
pub mod history;
pub mod locks;
mod retrieval;

pub use assess_core::Clock;

pub use app_services::AppServices;
pub use assessment::{AdaptiveAssessmentService, AnswerResult, NextAction};
pub use error::{AppServicesError, AssessmentError};
pub use follow_up::{FollowUpAnswerResult, FollowUpService};
pub use history::HistoryService;
pub use locks::{UserGuard, UserLocks};
