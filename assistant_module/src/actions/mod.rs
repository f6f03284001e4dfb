mod executor;
mod store;
mod types;

pub use executor::{execute_approved, ActionOutcome, ExecutorDeps, FOLLOW_UP_LABEL};
pub use store::{ActionStore, ActionStoreError};
pub use types::{
    Action, ActionKind, ActionStatus, BookMeetingPayload, MeetingRsvpPayload, MessagePayload,
    OutboundEmailPayload,
};
