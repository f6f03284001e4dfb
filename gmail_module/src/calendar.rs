//! Google Calendar operations: event creation and RSVP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::client::CalendarClient;
use crate::errors::GoogleApiError;

/// A new event on the user's primary calendar.
#[derive(Debug, Clone)]
pub struct EventRequest {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Attendee email addresses; the organizer is implicit.
    pub attendees: Vec<String>,
}

/// RSVP choices the assistant can make on the user's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    Accepted,
    Declined,
}

impl EventResponse {
    fn as_status(self) -> &'static str {
        match self {
            EventResponse::Accepted => "accepted",
            EventResponse::Declined => "declined",
        }
    }
}

/// The slice of a calendar event the service reads back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub html_link: Option<String>,
}

impl CalendarClient {
    /// Creates an event on the primary calendar and invites attendees.
    pub async fn create_event(
        &self,
        event: &EventRequest,
    ) -> Result<CalendarEvent, GoogleApiError> {
        let url = self.url("calendars/primary/events");
        let attendees: Vec<serde_json::Value> = event
            .attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();
        let payload = json!({
            "summary": event.summary,
            "description": event.description,
            "start": { "dateTime": event.start.to_rfc3339() },
            "end": { "dateTime": event.end.to_rfc3339() },
            "attendees": attendees,
        });
        let response = self
            .conn
            .execute(|token| {
                self.conn
                    .http()
                    .post(&url)
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        let body = response.text().await?;
        let created: CreatedEvent = serde_json::from_str(&body)?;
        info!(event_id = %created.id, summary = %event.summary, "created calendar event");
        Ok(CalendarEvent {
            id: created.id,
            summary: created.summary,
            html_link: created.html_link,
        })
    }

    /// Sets the user's RSVP on an existing event.
    ///
    /// Google has no direct "respond" endpoint; the event is fetched, the
    /// user's attendee entry is rewritten, and the attendee list patched
    /// back.
    pub async fn respond_to_event(
        &self,
        event_id: &str,
        user_email: &str,
        response: EventResponse,
    ) -> Result<(), GoogleApiError> {
        let url = self.url(&format!("calendars/primary/events/{event_id}"));
        let fetched = self
            .conn
            .execute(|token| self.conn.http().get(&url).bearer_auth(token))
            .await?;
        let body = fetched.text().await?;
        let event: EventWithAttendees = serde_json::from_str(&body)?;

        let wanted = user_email.trim().to_lowercase();
        let mut attendees = event.attendees;
        let entry = attendees
            .iter_mut()
            .find(|a| a.email.to_lowercase() == wanted)
            .ok_or_else(|| GoogleApiError::AttendeeNotFound {
                event_id: event_id.to_string(),
                user_email: user_email.to_string(),
            })?;
        entry.response_status = Some(response.as_status().to_string());

        let payload = json!({ "attendees": attendees });
        self.conn
            .execute(|token| {
                self.conn
                    .http()
                    .patch(&url)
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        info!(
            event_id,
            status = response.as_status(),
            "updated event rsvp"
        );
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEvent {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventWithAttendees {
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Attendee {
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organizer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}
