//! Command model.
//!
//! A command is a saga event representing work still to be done. Concrete
//! command types are defined by action implementations; the engine handles
//! them in an erased, log-ready form ([`CommandData`]) and matches them by
//! their type tag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed saga command.
///
/// Implementations declare a globally unique, stable type tag. The tag is
/// what `SagaCommandCompleted` markers are matched against, so changing it
/// breaks resumption of in-flight sagas.
pub trait SagaCommand: Serialize + DeserializeOwned + Send + Sync {
    /// Globally unique type tag, used for log matching.
    const TAG: &'static str;

    /// True for compensating ("undo") commands.
    const ROLLBACK: bool = false;
}

/// The erased, log-ready form of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    tag: String,
    rollback: bool,
    payload: serde_json::Value,
}

impl CommandData {
    /// Encodes a typed command into its log form.
    pub fn encode<C: SagaCommand>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tag: C::TAG.to_string(),
            rollback: C::ROLLBACK,
            payload: serde_json::to_value(command)?,
        })
    }

    /// Decodes back into the typed command, checking the tag first.
    pub fn decode<C: SagaCommand>(&self) -> Result<C, serde_json::Error> {
        use serde::de::Error as _;

        if self.tag != C::TAG {
            return Err(serde_json::Error::custom(format!(
                "Command tag mismatch: expected '{}', found '{}'",
                C::TAG,
                self.tag
            )));
        }
        serde_json::from_value(self.payload.clone())
    }

    /// Returns the command's type tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns true if this is a compensating command.
    pub fn is_rollback(&self) -> bool {
        self.rollback
    }

    /// Returns true if this command is of type `C`.
    pub fn is<C: SagaCommand>(&self) -> bool {
        self.tag == C::TAG
    }

    /// Returns the raw payload.
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

/// What an action emits to drive the flow forward.
///
/// `Many` carries two or more commands produced by a single action
/// invocation. It is a transport wrapper only: the orchestrator unwraps it
/// into individual command log entries, and the wrapper itself never
/// appears in the log.
#[derive(Debug, Clone, PartialEq)]
pub enum NextCommand {
    One(CommandData),
    Many(Vec<CommandData>),
}

impl NextCommand {
    /// Wraps a single typed command.
    pub fn of<C: SagaCommand>(command: &C) -> Result<Self, serde_json::Error> {
        Ok(NextCommand::One(CommandData::encode(command)?))
    }

    /// Wraps multiple commands emitted from one action invocation.
    pub fn many(commands: Vec<CommandData>) -> Self {
        NextCommand::Many(commands)
    }

    /// Unwraps into the individual commands, in emission order.
    pub fn into_commands(self) -> Vec<CommandData> {
        match self {
            NextCommand::One(command) => vec![command],
            NextCommand::Many(commands) => commands,
        }
    }
}
