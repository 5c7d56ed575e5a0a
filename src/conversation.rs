use thiserror::Error;
use tracing::{debug, error, warn};

use crate::client::{QueryReply, QueryService, TransportError};

/// Greeting shown as the only transcript entry of a fresh session.
pub const WELCOME_TEXT: &str =
    "Welcome to the Agricultural Data Assistant! How can I help you today?";

/// Fixed assistant reply appended when a request fails.
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Structured report data; assistant replies only.
    pub payload: Option<serde_json::Value>,
}

impl Message {
    fn user(text: String) -> Self {
        Self {
            role: Role::User,
            text,
            payload: None,
        }
    }

    fn assistant(text: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            payload,
        }
    }
}

/// Lifecycle of the single in-flight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Failed,
}

/// Rejection reasons for a submission. Both are silent in the UI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("a request is already in flight")]
    RequestInFlight,
}

/// The transcript plus the request state machine.
///
/// Every front-end renders from the same `Conversation`; none of them keep
/// their own message list or loading flag. The transcript is append-only and
/// its insertion order is the display order.
pub struct Conversation {
    transcript: Vec<Message>,
    status: RequestStatus,
}

impl Conversation {
    pub fn new() -> Self {
        let mut conversation = Self {
            transcript: Vec::new(),
            status: RequestStatus::Idle,
        };
        conversation.reset();
        conversation
    }

    /// Validate and record a user query, moving the conversation to Pending.
    ///
    /// Returns the trimmed text to send to the query service. Empty input
    /// and calls made while a request is already pending are rejected
    /// without touching the transcript.
    pub fn begin(&mut self, raw_text: &str) -> Result<String, SubmitError> {
        let query = raw_text.trim();
        if query.is_empty() {
            return Err(SubmitError::EmptyQuery);
        }
        if self.status == RequestStatus::Pending {
            return Err(SubmitError::RequestInFlight);
        }

        let query = query.to_string();
        debug!(query = %query, "query accepted");
        self.transcript.push(Message::user(query.clone()));
        self.status = RequestStatus::Pending;
        Ok(query)
    }

    /// Record the outcome of the in-flight query.
    ///
    /// Success appends the reply together with its payload; failure appends
    /// the fixed apology with no payload. A completion arriving while
    /// nothing is pending is dropped.
    pub fn complete(&mut self, outcome: Result<QueryReply, TransportError>) {
        if self.status != RequestStatus::Pending {
            warn!("completion arrived with no request pending");
            return;
        }

        match outcome {
            Ok(reply) => {
                self.transcript
                    .push(Message::assistant(reply.reply, reply.data));
                self.status = RequestStatus::Idle;
            }
            Err(err) => {
                error!(error = %err, "query failed");
                self.transcript.push(Message::assistant(APOLOGY_TEXT, None));
                self.status = RequestStatus::Failed;
            }
        }
    }

    /// Run one full round-trip against `service`.
    ///
    /// Transport failures are absorbed into the transcript as the apology
    /// entry; only the two silent rejections come back as errors.
    pub async fn submit(
        &mut self,
        service: &impl QueryService,
        raw_text: &str,
    ) -> Result<(), SubmitError> {
        let query = self.begin(raw_text)?;
        let outcome = service.ask(&query).await;
        self.complete(outcome);
        Ok(())
    }

    /// Drop the history and start over with the welcome message.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.transcript.push(Message::assistant(WELCOME_TEXT, None));
        self.status = RequestStatus::Idle;
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{QueryReply, QueryService, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays scripted outcomes in order, one per `ask`.
    struct ScriptedService {
        outcomes: Mutex<Vec<Result<QueryReply, TransportError>>>,
    }

    impl ScriptedService {
        fn new(outcomes: Vec<Result<QueryReply, TransportError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
            }
        }

        fn replying(reply: &str, data: Option<serde_json::Value>) -> Self {
            Self::new(vec![Ok(QueryReply {
                reply: reply.to_string(),
                data,
            })])
        }

        fn failing() -> Self {
            Self::new(vec![Err(TransportError::Status(500))])
        }
    }

    #[async_trait]
    impl QueryService for ScriptedService {
        async fn ask(&self, _text: &str) -> Result<QueryReply, TransportError> {
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    // ---- construction ----

    #[test]
    fn starts_with_the_welcome_message() {
        let conversation = Conversation::new();
        assert_eq!(conversation.transcript().len(), 1);
        assert_eq!(conversation.transcript()[0].role, Role::Assistant);
        assert_eq!(conversation.transcript()[0].text, WELCOME_TEXT);
        assert_eq!(conversation.status(), RequestStatus::Idle);
    }

    // ---- input guards ----

    #[test]
    fn empty_and_whitespace_input_change_nothing() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.begin(""), Err(SubmitError::EmptyQuery));
        assert_eq!(conversation.begin("   "), Err(SubmitError::EmptyQuery));
        assert_eq!(conversation.transcript().len(), 1);
        assert_eq!(conversation.status(), RequestStatus::Idle);
    }

    #[test]
    fn begin_appends_the_trimmed_user_message_and_goes_pending() {
        let mut conversation = Conversation::new();
        let query = conversation.begin("  Show total sales  ").unwrap();
        assert_eq!(query, "Show total sales");
        assert_eq!(conversation.transcript().len(), 2);

        let message = conversation.last_message().unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.text, "Show total sales");
        assert_eq!(message.payload, None);
        assert!(conversation.is_pending());
    }

    #[test]
    fn a_second_submission_while_pending_is_rejected() {
        let mut conversation = Conversation::new();
        conversation.begin("Show total sales").unwrap();
        assert_eq!(
            conversation.begin("Show sales by crop"),
            Err(SubmitError::RequestInFlight)
        );
        // Still just the welcome plus the first user message.
        assert_eq!(conversation.transcript().len(), 2);
        assert!(conversation.is_pending());
    }

    // ---- round trips ----

    #[tokio::test]
    async fn successful_submit_appends_the_reply_and_returns_to_idle() {
        let service = ScriptedService::replying(
            "Here are the sales figures by crop:",
            Some(json!({"crop_sales": []})),
        );
        let mut conversation = Conversation::new();
        conversation
            .submit(&service, "Show sales by crop")
            .await
            .unwrap();

        assert_eq!(conversation.transcript().len(), 3);
        let reply = conversation.last_message().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Here are the sales figures by crop:");
        assert_eq!(reply.payload, Some(json!({"crop_sales": []})));
        assert_eq!(conversation.status(), RequestStatus::Idle);
    }

    #[tokio::test]
    async fn transport_failure_appends_the_apology_and_marks_failed() {
        let service = ScriptedService::failing();
        let mut conversation = Conversation::new();
        conversation
            .submit(&service, "Show total sales")
            .await
            .unwrap();

        assert_eq!(conversation.transcript().len(), 3);
        let reply = conversation.last_message().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, APOLOGY_TEXT);
        assert_eq!(reply.payload, None);
        assert_eq!(conversation.status(), RequestStatus::Failed);
    }

    #[tokio::test]
    async fn failed_state_recovers_on_the_next_successful_submit() {
        let service = ScriptedService::new(vec![
            Err(TransportError::Network("connection refused".to_string())),
            Ok(QueryReply {
                reply: "ok".to_string(),
                data: None,
            }),
        ]);
        let mut conversation = Conversation::new();

        conversation.submit(&service, "first").await.unwrap();
        assert_eq!(conversation.status(), RequestStatus::Failed);

        conversation.submit(&service, "second").await.unwrap();
        assert_eq!(conversation.status(), RequestStatus::Idle);
        // Welcome plus two full round-trips.
        assert_eq!(conversation.transcript().len(), 5);
    }

    // ---- completion discipline ----

    #[test]
    fn completion_without_a_pending_request_is_dropped() {
        let mut conversation = Conversation::new();
        conversation.complete(Ok(QueryReply {
            reply: "stray".to_string(),
            data: None,
        }));
        assert_eq!(conversation.transcript().len(), 1);
        assert_eq!(conversation.status(), RequestStatus::Idle);
    }

    // ---- reset ----

    #[tokio::test]
    async fn reset_returns_to_a_single_welcome_message() {
        let service = ScriptedService::replying("done", None);
        let mut conversation = Conversation::new();
        conversation.submit(&service, "anything").await.unwrap();
        assert!(conversation.transcript().len() > 1);

        conversation.reset();
        assert_eq!(conversation.transcript().len(), 1);
        assert_eq!(conversation.transcript()[0].text, WELCOME_TEXT);
        assert_eq!(conversation.status(), RequestStatus::Idle);
    }
}
