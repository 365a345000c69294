//! Action and handler registry.
//!
//! An explicit map from logical identifier to a constructed instance,
//! injected into the orchestrator at construction time. Flows reference
//! these identifiers; resolution failures are fatal.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::{
    ActionAdapter, DynSagaAction, SagaAction, SagaCompletionHandler, SagaExceptionHandler,
};
use crate::error::SagaError;

/// Registry of saga actions, completion handlers, and exception handlers.
#[derive(Default)]
pub struct SagaRegistry {
    actions: HashMap<String, Arc<dyn DynSagaAction>>,
    completion_handlers: HashMap<String, Arc<dyn SagaCompletionHandler>>,
    exception_handlers: HashMap<String, Arc<dyn SagaExceptionHandler>>,
}

impl SagaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under a logical identifier.
    pub fn register_action<A>(mut self, name: impl Into<String>, action: A) -> Self
    where
        A: SagaAction + 'static,
    {
        self.actions
            .insert(name.into(), Arc::new(ActionAdapter(action)));
        self
    }

    /// Registers a completion handler under a logical identifier.
    pub fn register_completion_handler<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: SagaCompletionHandler + 'static,
    {
        self.completion_handlers
            .insert(name.into(), Arc::new(handler));
        self
    }

    /// Registers an exception handler under a logical identifier.
    pub fn register_exception_handler<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: SagaExceptionHandler + 'static,
    {
        self.exception_handlers
            .insert(name.into(), Arc::new(handler));
        self
    }

    /// Resolves an action by identifier.
    pub fn action(&self, name: &str) -> Result<Arc<dyn DynSagaAction>, SagaError> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| SagaError::UnknownHandler(name.to_string()))
    }

    /// Resolves a completion handler by identifier.
    pub fn completion_handler(
        &self,
        name: &str,
    ) -> Result<Arc<dyn SagaCompletionHandler>, SagaError> {
        self.completion_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| SagaError::UnknownHandler(name.to_string()))
    }

    /// Resolves an exception handler by identifier.
    pub fn exception_handler(
        &self,
        name: &str,
    ) -> Result<Arc<dyn SagaExceptionHandler>, SagaError> {
        self.exception_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| SagaError::UnknownHandler(name.to_string()))
    }
}
