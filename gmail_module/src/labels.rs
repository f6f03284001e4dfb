//! Gmail label management.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::client::GmailClient;
use crate::errors::GoogleApiError;

/// A Gmail label as returned by the labels endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailLabel {
    pub id: String,
    pub name: String,
    /// "system" for built-in labels such as INBOX, "user" otherwise.
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct LabelListResponse {
    #[serde(default)]
    labels: Vec<GmailLabel>,
}

impl GmailClient {
    /// All labels on the account, system and user alike.
    pub async fn list_labels(&self) -> Result<Vec<GmailLabel>, GoogleApiError> {
        let url = self.url("labels");
        let response = self
            .conn
            .execute(|token| self.conn.http().get(&url).bearer_auth(token))
            .await?;
        let body = response.text().await?;
        let list: LabelListResponse = serde_json::from_str(&body)?;
        Ok(list.labels)
    }

    /// Creates a user label visible in both message and label lists.
    ///
    /// `color` must come from Gmail's fixed label palette; anything else
    /// is rejected by the API, so callers pass `None` when unsure.
    pub async fn create_label(
        &self,
        name: &str,
        color: Option<&str>,
    ) -> Result<GmailLabel, GoogleApiError> {
        let url = self.url("labels");
        let mut payload = json!({
            "name": name,
            "labelListVisibility": "labelShow",
            "messageListVisibility": "show",
        });
        if let Some(background) = color {
            payload["color"] = json!({
                "backgroundColor": background,
                "textColor": "#ffffff",
            });
        }
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
        let label: GmailLabel = serde_json::from_str(&body)?;
        info!(label = %label.name, id = %label.id, "created gmail label");
        Ok(label)
    }

    /// Adds one label to a message.
    pub async fn apply_label(
        &self,
        message_id: &str,
        label_id: &str,
    ) -> Result<(), GoogleApiError> {
        self.modify_message(message_id, &[label_id], &[]).await
    }

    /// Removes one label from a message.
    pub async fn remove_label(
        &self,
        message_id: &str,
        label_id: &str,
    ) -> Result<(), GoogleApiError> {
        self.modify_message(message_id, &[], &[label_id]).await
    }

    /// Archives a message by dropping it out of the inbox.
    pub async fn archive_message(&self, message_id: &str) -> Result<(), GoogleApiError> {
        self.modify_message(message_id, &[], &["INBOX"]).await
    }

    async fn modify_message(
        &self,
        message_id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), GoogleApiError> {
        let url = self.url(&format!("messages/{message_id}/modify"));
        let payload = json!({
            "addLabelIds": add,
            "removeLabelIds": remove,
        });
        self.conn
            .execute(|token| {
                self.conn
                    .http()
                    .post(&url)
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        Ok(())
    }
}
