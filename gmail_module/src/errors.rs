use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleApiError {
    #[error("google api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("google api returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode google api response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("access token rejected and no refresh credentials are configured")]
    TokenExpired,

    #[error("invalid draft: {0}")]
    InvalidDraft(String),

    #[error("calendar event {event_id} has no attendee entry for {user_email}")]
    AttendeeNotFound { event_id: String, user_email: String },
}
