//! JSON command protocol.
//!
//! One request per line:
//!
//! ```json
//! {"id": 7, "actor": {"id": "123", "name": "Alice", "roles": ["V3"]},
//!  "command": {"type": "register", "event": "weekly", "numbers": [5, 9]}}
//! ```
//!
//! and one response per request, echoing the request id:
//!
//! ```json
//! {"id": 7, "ok": {"claimed": [5, 9], "remaining_quota": 1}}
//! {"id": 8, "error": {"code": "NUMBER_ALREADY_TAKEN", "message": "..."}}
//! ```

use crate::quota::QuotaResolver;
use lucky_draw_core::registry::{EventRegistry, Registration};
use lucky_draw_core::{EventName, LuckyDrawError, ParticipantId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Error code for lines that are not a valid request.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

/// The member issuing a command, as reported by the chat platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    /// Platform user id
    pub id: ParticipantId,
    /// Display name recorded on new entries
    pub name: String,
    /// Role labels used for quota resolution
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Participant an operator registers on someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A platform member, by id
    Member {
        /// Platform user id
        id: ParticipantId,
        /// Display name; defaults to the id
        #[serde(default)]
        name: Option<String>,
    },
    /// Someone without a platform account
    External(String),
}

impl Target {
    fn resolve(self) -> (ParticipantId, String) {
        match self {
            Self::Member { id, name } => {
                let name = name.unwrap_or_else(|| id.to_string());
                (id, name)
            }
            Self::External(name) => {
                let name = name.trim().to_string();
                (ParticipantId::external(&name), name)
            }
        }
    }
}

/// Commands understood by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Open an event owned by the actor
    CreateEvent {
        /// Event name
        event: EventName,
        /// Pairs drawn at the end
        num_winners: u32,
    },
    /// Claim numbers for the actor, quota from their roles
    Register {
        /// Event name
        event: EventName,
        /// Numbers to claim
        numbers: Vec<u32>,
    },
    /// Claim numbers for someone else with an explicit quota (creator only)
    AdminAddEntry {
        /// Event name
        event: EventName,
        /// Who the numbers are for
        target: Target,
        /// Quota applied instead of a role-derived one
        quota: u32,
        /// Numbers to claim
        numbers: Vec<u32>,
    },
    /// Entries of an event
    ListEntries {
        /// Event name
        event: EventName,
    },
    /// Summaries of all open events
    ListEvents,
    /// Unclaimed numbers of an event
    AvailableNumbers {
        /// Event name
        event: EventName,
    },
    /// Draw winners and close the event (creator only)
    Draw {
        /// Event name
        event: EventName,
    },
    /// Close the event without drawing (creator only)
    CancelEvent {
        /// Event name
        event: EventName,
    },
}

impl Command {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "create_event",
            Self::Register { .. } => "register",
            Self::AdminAddEntry { .. } => "admin_add_entry",
            Self::ListEntries { .. } => "list_entries",
            Self::ListEvents => "list_events",
            Self::AvailableNumbers { .. } => "available_numbers",
            Self::Draw { .. } => "draw",
            Self::CancelEvent { .. } => "cancel_event",
        }
    }
}

/// A single protocol request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Opaque correlation id, echoed in the response
    #[serde(default)]
    pub id: Value,
    /// Who is asking
    pub actor: Actor,
    /// What they ask for
    pub command: Command,
}

/// Failure body of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl From<&LuckyDrawError> for ErrorBody {
    fn from(error: &LuckyDrawError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Command succeeded with this payload
    Ok(Value),
    /// Command failed
    Error(ErrorBody),
}

/// A single protocol response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers
    pub id: Value,
    /// Result
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    /// Whether the command succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }

    /// Error code if the command failed.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Ok(_) => None,
            Outcome::Error(body) => Some(&body.code),
        }
    }
}

/// Executes requests against a shared registry.
///
/// Cheap to clone; each connection task holds its own handle.
#[derive(Clone)]
pub struct CommandHandler {
    registry: Arc<EventRegistry>,
    quotas: Arc<dyn QuotaResolver>,
}

impl CommandHandler {
    /// Create a handler.
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>, quotas: Arc<dyn QuotaResolver>) -> Self {
        Self { registry, quotas }
    }

    /// Registry commands are executed against.
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Parse and execute one protocol line.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                // Echo the id when the line is at least a JSON object.
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").cloned())
                    .unwrap_or(Value::Null);
                tracing::warn!(error = %e, "Rejected malformed request");
                metrics::counter!("lucky_draw.commands.malformed").increment(1);
                Response {
                    id,
                    outcome: Outcome::Error(ErrorBody {
                        code: INVALID_REQUEST.to_string(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    /// Execute a parsed request.
    #[tracing::instrument(
        skip(self, request),
        fields(command = request.command.name(), actor = %request.actor.id)
    )]
    pub async fn handle(&self, request: Request) -> Response {
        let Request { id, actor, command } = request;
        let outcome = match self.execute(&actor, command).await {
            Ok(payload) => Outcome::Ok(payload),
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "Command failed");
                Outcome::Error(ErrorBody::from(&e))
            }
        };
        Response { id, outcome }
    }

    async fn execute(&self, actor: &Actor, command: Command) -> lucky_draw_core::Result<Value> {
        match command {
            Command::CreateEvent { event, num_winners } => {
                let event = self
                    .registry
                    .create_event(event, actor.id.clone(), num_winners)
                    .await?;
                Ok(json!(event.summary()))
            }
            Command::Register { event, numbers } => {
                let quota = self.quotas.quota(&actor.roles);
                let claim = self
                    .registry
                    .register(Registration {
                        event,
                        participant_id: actor.id.clone(),
                        display_name: actor.name.clone(),
                        quota,
                        numbers,
                    })
                    .await?;
                Ok(json!({ "claimed": claim.numbers, "remaining_quota": claim.remaining_quota }))
            }
            Command::AdminAddEntry {
                event,
                target,
                quota,
                numbers,
            } => {
                let (participant_id, display_name) = target.resolve();
                tracing::info!(operator = %actor.id, participant = %participant_id, "Operator entry");
                let claim = self
                    .registry
                    .admin_add_entry(
                        &actor.id,
                        Registration {
                            event,
                            participant_id: participant_id.clone(),
                            display_name,
                            quota,
                            numbers,
                        },
                    )
                    .await?;
                Ok(json!({
                    "participant_id": participant_id,
                    "claimed": claim.numbers,
                    "remaining_quota": claim.remaining_quota
                }))
            }
            Command::ListEntries { event } => {
                Ok(json!({ "entries": self.registry.list_entries(&event).await? }))
            }
            Command::ListEvents => Ok(json!({ "events": self.registry.list_events().await })),
            Command::AvailableNumbers { event } => {
                Ok(json!({ "numbers": self.registry.available_numbers(&event).await? }))
            }
            Command::Draw { event } => {
                let winners = self.registry.draw(&event, &actor.id).await?;
                Ok(json!({ "event": event, "winners": winners }))
            }
            Command::CancelEvent { event } => {
                self.registry.cancel(&event, &actor.id).await?;
                Ok(json!({ "cancelled": event }))
            }
        }
    }
}
