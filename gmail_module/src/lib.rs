//! Google API clients for the assistant: Gmail (messages, labels,
//! drafts) and Calendar (events, RSVP), sharing one authenticated
//! connection with automatic token refresh.

mod calendar;
mod client;
mod drafts;
mod errors;
mod labels;
mod messages;

pub use calendar::{CalendarEvent, EventRequest, EventResponse};
pub use client::{CalendarClient, GmailClient, GoogleAuth, GoogleConnection};
pub use drafts::DraftRequest;
pub use errors::GoogleApiError;
pub use labels::GmailLabel;
pub use messages::{EmailMessage, ThreadMessage, DEFAULT_QUERY};
