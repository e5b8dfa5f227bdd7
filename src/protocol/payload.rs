//! Request payload and evaluation body construction.
//!
//! A [`RequestPayload`] arrives inside a request frame. The executor turns it
//! into an [`EvaluationBody`], the JSON document posted to the evaluation
//! endpoint.
//!
//! # Evaluation Body
//!
//! ```json
//! {
//!   "id": "session",
//!   "mode": "battle",
//!   "userMessageId": "<id of last message>",
//!   "modelAMessageId": "<slot a>",
//!   "modelBMessageId": "<slot b>",
//!   "messages": [ ... ],
//!   "modality": "chat"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::identifiers::{MessageId, SessionId};

// ============================================================================
// Participant
// ============================================================================

/// One side of a two-participant exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    /// Participant `a`.
    A,
    /// Participant `b`.
    #[default]
    B,
}

impl Participant {
    /// Returns the single-character tag used in stream records.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::A => 'a',
            Self::B => 'b',
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ============================================================================
// MessageTemplate
// ============================================================================

/// One message of the conversation, as supplied by the coordinator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageTemplate {
    /// Message role (`user`, `assistant`, `system`).
    pub role: String,

    /// Message content.
    #[serde(default = "empty_content")]
    pub content: Value,

    /// Attachments, passed through untouched.
    #[serde(default)]
    pub attachments: Vec<Value>,

    /// Participant the message belongs to.
    #[serde(default, rename = "participantPosition")]
    pub participant_position: Participant,
}

fn empty_content() -> Value {
    Value::String(String::new())
}

// ============================================================================
// RequestPayload
// ============================================================================

/// Payload of a request frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestPayload {
    /// Ordered conversation messages.
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_templates: Vec<MessageTemplate>,

    /// Requested model, if any.
    #[serde(default)]
    pub target_model_id: Option<String>,

    /// Evaluation session.
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_id: SessionId,

    /// Participant whose stream is relayed.
    #[serde(default)]
    pub battle_target: Participant,

    /// Image generation request.
    #[serde(default)]
    pub is_image_request: bool,
}

/// Reads an explicit `null` as the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// EvaluationMessage
// ============================================================================

/// A message as sent to the evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMessage {
    /// Generated identifier.
    pub id: MessageId,
    /// Owning session.
    pub evaluation_session_id: SessionId,
    /// Message role.
    pub role: String,
    /// Message content.
    pub content: Value,
    /// Attachments.
    #[serde(rename = "experimental_attachments")]
    pub experimental_attachments: Vec<Value>,
    /// Identifier of the preceding message, if any.
    pub parent_message_ids: Vec<MessageId>,
    /// Participant position (defaults to `b`).
    pub participant_position: Participant,
    /// `pending` for the message awaiting a reply, otherwise `success`.
    pub status: &'static str,
}

// ============================================================================
// EvaluationBody
// ============================================================================

/// JSON document posted to the evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationBody {
    /// Session identifier.
    pub id: SessionId,
    /// Always `battle`.
    pub mode: &'static str,
    /// Identifier of the final message.
    pub user_message_id: MessageId,
    /// Participant slot `a`.
    pub model_a_message_id: MessageId,
    /// Participant slot `b`.
    pub model_b_message_id: MessageId,
    /// Model for slot `a`, when targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_a_id: Option<String>,
    /// Model for slot `b`, when targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_b_id: Option<String>,
    /// Ordered messages.
    pub messages: Vec<EvaluationMessage>,
    /// `chat` or `image`.
    pub modality: &'static str,
}

impl EvaluationBody {
    /// Builds the body for a payload.
    ///
    /// Generates one identifier per message in template order, then the two
    /// participant-slot identifiers, so a request uses
    /// `message_templates.len() + 2` identifiers.
    ///
    /// Returns `None` for an empty template list.
    #[must_use]
    pub fn build(payload: &RequestPayload) -> Option<Self> {
        let last_index = payload.message_templates.len().checked_sub(1)?;

        let mut messages = Vec::with_capacity(payload.message_templates.len());
        let mut parent: Option<MessageId> = None;

        for (index, template) in payload.message_templates.iter().enumerate() {
            let id = MessageId::generate();
            let status = if !payload.is_image_request && index == last_index {
                "pending"
            } else {
                "success"
            };

            messages.push(EvaluationMessage {
                id,
                evaluation_session_id: payload.session_id.clone(),
                role: template.role.clone(),
                content: template.content.clone(),
                experimental_attachments: template.attachments.clone(),
                parent_message_ids: parent.into_iter().collect(),
                participant_position: template.participant_position,
                status,
            });
            parent = Some(id);
        }

        let model_a_message_id = MessageId::generate();
        let model_b_message_id = MessageId::generate();

        let target_model = payload
            .target_model_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let (model_a_id, model_b_id) = match payload.battle_target {
            Participant::A => (target_model, None),
            Participant::B => (None, target_model),
        };

        Some(Self {
            id: payload.session_id.clone(),
            mode: "battle",
            user_message_id: messages[last_index].id,
            model_a_message_id,
            model_b_message_id,
            model_a_id,
            model_b_id,
            messages,
            modality: if payload.is_image_request { "image" } else { "chat" },
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use serde_json::json;

    fn payload(templates: Value) -> RequestPayload {
        serde_json::from_value(json!({
            "session_id": "sess-1",
            "message_templates": templates,
        }))
        .expect("payload")
    }

    #[test]
    fn test_payload_defaults() {
        let payload: RequestPayload = serde_json::from_value(json!({})).expect("payload");
        assert!(payload.session_id.is_empty());
        assert!(payload.message_templates.is_empty());
        assert_eq!(payload.battle_target, Participant::B);
        assert!(!payload.is_image_request);
    }

    #[test]
    fn test_template_participant_defaults_to_b() {
        let template: MessageTemplate =
            serde_json::from_value(json!({"role": "user", "content": "hi"})).expect("template");
        assert_eq!(template.participant_position, Participant::B);
    }

    #[test]
    fn test_build_empty_returns_none() {
        assert!(EvaluationBody::build(&payload(json!([]))).is_none());
    }

    #[test]
    fn test_build_preserves_order_and_chains_parents() {
        let body = EvaluationBody::build(&payload(json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hello", "participantPosition": "a"},
            {"role": "user", "content": "again"}
        ])))
        .expect("body");

        let roles: Vec<_> = body.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "user"]);

        assert!(body.messages[0].parent_message_ids.is_empty());
        assert_eq!(body.messages[1].parent_message_ids, vec![body.messages[0].id]);
        assert_eq!(body.messages[2].parent_message_ids, vec![body.messages[1].id]);

        assert_eq!(body.messages[1].participant_position, Participant::A);
        assert_eq!(body.messages[2].participant_position, Participant::B);

        assert_eq!(body.messages[0].status, "success");
        assert_eq!(body.messages[2].status, "pending");
        assert_eq!(body.user_message_id, body.messages[2].id);
        assert_eq!(body.modality, "chat");
    }

    #[test]
    fn test_build_generates_len_plus_two_ordered_ids() {
        let body = EvaluationBody::build(&payload(json!([
            {"role": "user", "content": "a"},
            {"role": "user", "content": "b"}
        ])))
        .expect("body");

        let mut ids: Vec<MessageId> = body.messages.iter().map(|m| m.id).collect();
        ids.push(body.model_a_message_id);
        ids.push(body.model_b_message_id);

        assert_eq!(ids.len(), 4);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_image_request_marks_all_success() {
        let mut payload = payload(json!([{"role": "user", "content": "draw"}]));
        payload.is_image_request = true;

        let body = EvaluationBody::build(&payload).expect("body");
        assert_eq!(body.modality, "image");
        assert!(body.messages.iter().all(|m| m.status == "success"));
    }

    #[test]
    fn test_target_model_follows_battle_target() {
        let mut payload = payload(json!([{"role": "user", "content": "x"}]));
        payload.target_model_id = Some("model-x".into());

        let body = EvaluationBody::build(&payload).expect("body");
        assert_eq!(body.model_b_id.as_deref(), Some("model-x"));
        assert!(body.model_a_id.is_none());

        payload.battle_target = Participant::A;
        let body = EvaluationBody::build(&payload).expect("body");
        assert_eq!(body.model_a_id.as_deref(), Some("model-x"));
    }

    #[test]
    fn test_body_serialization_shape() {
        let body = EvaluationBody::build(&payload(json!([{"role": "user", "content": "x"}])))
            .expect("body");
        let value = serde_json::to_value(&body).expect("serialize");

        assert_eq!(value["id"], "sess-1");
        assert_eq!(value["mode"], "battle");
        assert!(value.get("modelAId").is_none());
        assert_eq!(value["messages"][0]["evaluationSessionId"], "sess-1");
        assert_eq!(value["messages"][0]["participantPosition"], "b");
        assert!(value["messages"][0]["experimental_attachments"].is_array());
        assert!(value["messages"][0]["parentMessageIds"].is_array());
    }
}
