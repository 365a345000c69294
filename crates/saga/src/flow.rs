//! Static flow declarations.

/// The ordered declaration of which actions constitute a saga type.
///
/// Actions and handlers are referenced by the logical identifier they were
/// registered under, not embedded instances; resolution happens through
/// the [`SagaRegistry`](crate::registry::SagaRegistry) when the flow runs.
#[derive(Debug, Clone, Default)]
pub struct SagaFlow {
    actions: Vec<String>,
    completion_handler: Option<String>,
    exception_handler: Option<String>,
}

impl SagaFlow {
    /// Creates an empty flow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action to the flow.
    pub fn then(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Sets the handler invoked once the saga reaches its terminal state.
    pub fn completion_handler(mut self, handler: impl Into<String>) -> Self {
        self.completion_handler = Some(handler.into());
        self
    }

    /// Sets the handler that translates action errors before re-raise.
    pub fn exception_handler(mut self, handler: impl Into<String>) -> Self {
        self.exception_handler = Some(handler.into());
        self
    }

    /// Returns the declared action identifiers, in order.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Returns the completion handler identifier, if declared.
    pub fn completion_handler_id(&self) -> Option<&str> {
        self.completion_handler.as_deref()
    }

    /// Returns the exception handler identifier, if declared.
    pub fn exception_handler_id(&self) -> Option<&str> {
        self.exception_handler.as_deref()
    }
}
