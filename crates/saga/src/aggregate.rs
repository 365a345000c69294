//! The saga aggregate.

use common::SagaId;
use event_store::Sequence;

use crate::command::CommandData;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::state::SagaState;

/// An event together with its position in the saga's persisted log.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Position in the saga's log.
    pub sequence: Sequence,
    /// The recorded fact.
    pub event: SagaEvent,
}

/// An event-sourced saga instance.
///
/// The aggregate is an append-only view: its history is the ordered event
/// log, scalar state (`sequence`, `completed`) is derived by folding that
/// log, and mutation happens only by appending. Events added in memory sit
/// in `pending` until the repository persists them; the repository returns
/// a refreshed snapshot after every save, so sequences are always read
/// from durable state.
#[derive(Debug, Clone)]
pub struct Saga {
    saga_id: SagaId,
    /// Sequence of the last applied command. Never decreases.
    sequence: Sequence,
    /// Position of the latest persisted event, the optimistic-append anchor.
    version: Sequence,
    events: Vec<RecordedEvent>,
    pending: Vec<SagaEvent>,
    completed: bool,
    success: bool,
    compensating: bool,
}

impl Saga {
    /// Creates a new, empty saga instance.
    pub fn new(saga_id: SagaId) -> Self {
        Self {
            saga_id,
            sequence: Sequence::initial(),
            version: Sequence::initial(),
            events: Vec::new(),
            pending: Vec::new(),
            completed: false,
            success: false,
            compensating: false,
        }
    }

    /// Folds one persisted event into the aggregate.
    ///
    /// Called by the repository while replaying the log, in sequence order.
    /// Must stay pure and deterministic: the same log always rebuilds the
    /// same state.
    pub fn apply(&mut self, sequence: Sequence, event: SagaEvent) {
        self.fold(&event);
        self.events.push(RecordedEvent { sequence, event });
        if sequence > self.version {
            self.version = sequence;
        }
    }

    fn fold(&mut self, event: &SagaEvent) {
        match event {
            SagaEvent::Command(_) => {}
            SagaEvent::CommandCompleted(data) => {
                // The applied command's position becomes the saga sequence
                if let Some(command_sequence) = self.latest_command_sequence(&data.command)
                    && command_sequence > self.sequence
                {
                    self.sequence = command_sequence;
                }
            }
            SagaEvent::ActionErrorOccurred(_) => {}
            SagaEvent::Completed(data) => {
                self.completed = true;
                self.success = data.success;
            }
            SagaEvent::RollbackStarted => self.compensating = true,
            SagaEvent::RollbackCompleted => self.compensating = false,
            SagaEvent::LogAppended(_) => {}
        }
    }

    fn latest_command_sequence(&self, tag: &str) -> Option<Sequence> {
        self.events
            .iter()
            .rev()
            .find_map(|recorded| match &recorded.event {
                SagaEvent::Command(data) if data.tag() == tag => Some(recorded.sequence),
                _ => None,
            })
    }

    /// Returns true if the log contains a completion marker for the given
    /// command type tag.
    pub fn completed_command(&self, tag: &str) -> bool {
        let in_history = self.events.iter().any(|recorded| {
            matches!(&recorded.event, SagaEvent::CommandCompleted(data) if data.command == tag)
        });
        in_history
            || self
                .pending
                .iter()
                .any(|event| matches!(event, SagaEvent::CommandCompleted(data) if data.command == tag))
    }

    /// Returns the most recent unapplied persisted command of the given
    /// type, with its log position.
    ///
    /// A command becomes runnable once it has been durably persisted;
    /// pending in-memory commands are not returned because they have no
    /// position yet.
    pub fn next_command(&self, tag: &str) -> Option<(Sequence, CommandData)> {
        if self.completed_command(tag) {
            return None;
        }
        self.events
            .iter()
            .rev()
            .find_map(|recorded| match &recorded.event {
                SagaEvent::Command(data) if data.tag() == tag => {
                    Some((recorded.sequence, data.clone()))
                }
                _ => None,
            })
    }

    /// Returns true if any command in the log lacks its completion marker.
    pub fn has_unapplied_commands(&self) -> bool {
        let recorded_tags = self.events.iter().filter_map(|recorded| {
            if let SagaEvent::Command(data) = &recorded.event {
                Some(data.tag())
            } else {
                None
            }
        });
        let pending_tags = self.pending.iter().filter_map(|event| {
            if let SagaEvent::Command(data) = event {
                Some(data.tag())
            } else {
                None
            }
        });
        recorded_tags
            .chain(pending_tags)
            .any(|tag| !self.completed_command(tag))
    }

    /// Appends an event to the in-memory log. The repository persists the
    /// same append on the next save.
    pub fn add_event(&mut self, event: SagaEvent) {
        self.fold(&event);
        self.pending.push(event);
    }

    /// Marks the saga terminal. A saga completes exactly once: once
    /// terminal, further calls are no-ops.
    pub fn complete(&mut self, success: bool) {
        if self.completed {
            return;
        }
        self.add_event(SagaEvent::completed(success));
    }

    /// Appends a diagnostic log message.
    pub fn log(&mut self, message: impl Into<String>) {
        self.add_event(SagaEvent::log(message));
    }

    /// Advances the monotonic sequence counter. Values below the current
    /// sequence are rejected.
    pub fn set_sequence(&mut self, sequence: Sequence) -> Result<(), SagaError> {
        if sequence < self.sequence {
            return Err(SagaError::SequenceRollback {
                current: self.sequence,
                requested: sequence,
            });
        }
        self.sequence = sequence;
        Ok(())
    }

    /// Drains the events awaiting persistence.
    pub fn take_pending(&mut self) -> Vec<SagaEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Returns the saga's identity.
    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    /// Returns the logical saga type name.
    pub fn name(&self) -> &str {
        self.saga_id.name()
    }

    /// Returns the unique instance identifier.
    pub fn id(&self) -> &str {
        self.saga_id.id()
    }

    /// Returns the sequence of the last applied command.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Returns the position of the latest persisted event.
    pub fn version(&self) -> Sequence {
        self.version
    }

    /// Returns true once the saga is terminal.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns true if the saga completed successfully.
    pub fn is_successful(&self) -> bool {
        self.completed && self.success
    }

    /// Returns the derived lifecycle state.
    pub fn status(&self) -> SagaState {
        if self.completed {
            if self.success {
                SagaState::Succeeded
            } else {
                SagaState::Failed
            }
        } else if self.compensating {
            SagaState::Compensating
        } else {
            SagaState::Running
        }
    }

    /// Returns the persisted history, oldest first.
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Returns the events awaiting persistence.
    pub fn pending_events(&self) -> &[SagaEvent] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SagaCommand;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct StartDeploy;

    impl SagaCommand for StartDeploy {
        const TAG: &'static str = "deploy/start";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct SubmitJob;

    impl SagaCommand for SubmitJob {
        const TAG: &'static str = "deploy/submit";
    }

    fn saga() -> Saga {
        Saga::new(SagaId::new("deploy", "s-1"))
    }

    fn command_event<C: SagaCommand>(command: &C) -> SagaEvent {
        SagaEvent::command_of(command).unwrap()
    }

    #[test]
    fn new_saga_is_running_and_empty() {
        let saga = saga();
        assert_eq!(saga.sequence(), Sequence::initial());
        assert_eq!(saga.version(), Sequence::initial());
        assert!(!saga.is_completed());
        assert_eq!(saga.status(), SagaState::Running);
        assert!(saga.events().is_empty());
        assert!(!saga.has_unapplied_commands());
    }

    #[test]
    fn apply_tracks_version_and_commands() {
        let mut saga = saga();
        saga.apply(Sequence::new(1), command_event(&StartDeploy));

        assert_eq!(saga.version(), Sequence::new(1));
        assert!(saga.has_unapplied_commands());
        assert!(!saga.completed_command(StartDeploy::TAG));

        let (sequence, command) = saga.next_command(StartDeploy::TAG).unwrap();
        assert_eq!(sequence, Sequence::new(1));
        assert!(command.is::<StartDeploy>());
    }

    #[test]
    fn completion_marker_applies_command() {
        let mut saga = saga();
        saga.apply(Sequence::new(1), command_event(&StartDeploy));
        saga.apply(
            Sequence::new(2),
            SagaEvent::command_completed(StartDeploy::TAG),
        );

        assert!(saga.completed_command(StartDeploy::TAG));
        assert!(saga.next_command(StartDeploy::TAG).is_none());
        assert!(!saga.has_unapplied_commands());
        // Sequence advanced to the applied command's position
        assert_eq!(saga.sequence(), Sequence::new(1));
    }

    #[test]
    fn next_command_returns_most_recent_instance() {
        let mut saga = saga();
        saga.apply(Sequence::new(1), command_event(&StartDeploy));
        saga.apply(Sequence::new(2), command_event(&StartDeploy));

        let (sequence, _) = saga.next_command(StartDeploy::TAG).unwrap();
        assert_eq!(sequence, Sequence::new(2));
    }

    #[test]
    fn unapplied_commands_across_history_and_pending() {
        let mut saga = saga();
        saga.apply(Sequence::new(1), command_event(&StartDeploy));
        saga.apply(
            Sequence::new(2),
            SagaEvent::command_completed(StartDeploy::TAG),
        );
        assert!(!saga.has_unapplied_commands());

        saga.add_event(command_event(&SubmitJob));
        assert!(saga.has_unapplied_commands());
        // Pending commands have no position yet, so they are not runnable
        assert!(saga.next_command(SubmitJob::TAG).is_none());
    }

    #[test]
    fn complete_is_idempotent_and_terminal() {
        let mut saga = saga();
        saga.complete(true);
        assert!(saga.is_completed());
        assert!(saga.is_successful());
        assert_eq!(saga.status(), SagaState::Succeeded);
        assert_eq!(saga.pending_events().len(), 1);

        // Second completion is a no-op
        saga.complete(false);
        assert!(saga.is_successful());
        assert_eq!(saga.pending_events().len(), 1);
    }

    #[test]
    fn failed_completion_reported_in_status() {
        let mut saga = saga();
        saga.complete(false);
        assert!(saga.is_completed());
        assert!(!saga.is_successful());
        assert_eq!(saga.status(), SagaState::Failed);
    }

    #[test]
    fn rollback_events_toggle_compensating() {
        let mut saga = saga();
        saga.add_event(SagaEvent::RollbackStarted);
        assert_eq!(saga.status(), SagaState::Compensating);

        saga.add_event(SagaEvent::RollbackCompleted);
        assert_eq!(saga.status(), SagaState::Running);
    }

    #[test]
    fn set_sequence_rejects_regression() {
        let mut saga = saga();
        saga.set_sequence(Sequence::new(3)).unwrap();
        assert_eq!(saga.sequence(), Sequence::new(3));

        let result = saga.set_sequence(Sequence::new(2));
        assert!(matches!(result, Err(SagaError::SequenceRollback { .. })));
        assert_eq!(saga.sequence(), Sequence::new(3));

        // Same value is allowed
        saga.set_sequence(Sequence::new(3)).unwrap();
    }

    #[test]
    fn take_pending_drains_in_order() {
        let mut saga = saga();
        saga.log("first");
        saga.complete(true);

        let pending = saga.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].event_type(), "SagaLogAppended");
        assert_eq!(pending[1].event_type(), "SagaCompleted");
        assert!(saga.pending_events().is_empty());
        // Flags survive the drain
        assert!(saga.is_completed());
    }

    #[test]
    fn fold_is_deterministic_across_replays() {
        let build = || {
            let mut saga = saga();
            saga.apply(Sequence::new(1), command_event(&StartDeploy));
            saga.apply(
                Sequence::new(2),
                SagaEvent::command_completed(StartDeploy::TAG),
            );
            saga.apply(Sequence::new(3), command_event(&SubmitJob));
            saga.apply(
                Sequence::new(4),
                SagaEvent::command_completed(SubmitJob::TAG),
            );
            saga.apply(Sequence::new(5), SagaEvent::completed(true));
            saga
        };

        let a = build();
        let b = build();
        assert_eq!(a.sequence(), b.sequence());
        assert_eq!(a.version(), b.version());
        assert_eq!(a.is_completed(), b.is_completed());
        assert_eq!(a.sequence(), Sequence::new(3));
        assert_eq!(a.version(), Sequence::new(5));
        assert!(a.is_successful());
    }
}
