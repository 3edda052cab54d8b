mod command;
pub mod domain;
mod service;

pub use command::ResolveAppealCommand;
pub use domain::{
    Appeal, AppealDecision, AppealStatus, AppealSubmission, AppealType, DeadlineWindow,
    DecisionOutcome, Escalation, OriginalAction, ReplacementAction,
};
pub use service::AppealService;
