use std::time::Duration;

use itinera_model::ModelProvider;

use super::{Agent, DEFAULT_MAX_TURNS, MessageObserver, Stage, StageObserver};
use crate::conversation::Message;
use crate::planner::{ModelPlanner, Planner};
use crate::termination::{MarkerDetector, TerminationDetector};
use crate::tool::{
    Invoker, Registry, RegistryError, Tool, ToolDescriptor, ToolOutput,
};

/// [`Agent`] builder.
pub struct AgentBuilder {
    planner: Box<dyn Planner>,
    registry: Registry,
    registration_error: Option<RegistryError>,
    detector: Box<dyn TerminationDetector>,
    max_turns: usize,
    planner_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    on_stage_change: Option<StageObserver>,
    on_message: Option<MessageObserver>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified planner.
    pub fn with_planner<P: Planner + 'static>(planner: P) -> Self {
        Self {
            planner: Box::new(planner),
            registry: Registry::new(),
            registration_error: None,
            detector: Box::new(MarkerDetector::default()),
            max_turns: DEFAULT_MAX_TURNS,
            planner_timeout: None,
            tool_timeout: None,
            on_stage_change: None,
            on_message: None,
        }
    }

    /// Creates a new builder planning with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_planner(ModelPlanner::new(provider))
    }

    /// Registers a tool.
    ///
    /// Registration errors are reported by [`AgentBuilder::build`].
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let result = self.registry.register(tool).map(|_| ());
        self.keep_first_error(result);
        self
    }

    /// Registers a closure under an explicit descriptor.
    #[inline]
    pub fn with_fn_tool<F>(mut self, descriptor: ToolDescriptor, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> ToolOutput + Send + Sync + 'static,
    {
        let result = self.registry.register_fn(descriptor, f).map(|_| ());
        self.keep_first_error(result);
        self
    }

    /// Replaces the default [`MarkerDetector`].
    #[inline]
    pub fn with_detector<D: TerminationDetector + 'static>(
        mut self,
        detector: D,
    ) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Sets the maximum number of planner turns. Values below 1 are raised
    /// to 1.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Fails the conversation when the planner takes longer than `timeout`.
    #[inline]
    pub fn with_planner_timeout(mut self, timeout: Duration) -> Self {
        self.planner_timeout = Some(timeout);
        self
    }

    /// Fails a tool call when it takes longer than `timeout`.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Attaches a callback invoked on every stage transition.
    #[inline]
    pub fn on_stage_change(
        mut self,
        f: impl Fn(Stage) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage_change = Some(Box::new(f));
        self
    }

    /// Attaches a callback invoked for every message appended to the
    /// transcript.
    #[inline]
    pub fn on_message(
        mut self,
        f: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Builds the agent, or returns the first registration error.
    pub fn build(self) -> Result<Agent, RegistryError> {
        if let Some(err) = self.registration_error {
            return Err(err);
        }
        let mut invoker = Invoker::new(self.registry);
        if let Some(timeout) = self.tool_timeout {
            invoker = invoker.with_timeout(timeout);
        }
        debug!(
            "agent built with {} tool(s), max turns: {}",
            invoker.registry().len(),
            self.max_turns
        );
        Ok(Agent {
            planner: self.planner,
            invoker,
            detector: self.detector,
            max_turns: self.max_turns,
            planner_timeout: self.planner_timeout,
            on_stage_change: self.on_stage_change,
            on_message: self.on_message,
        })
    }

    fn keep_first_error(&mut self, result: Result<(), RegistryError>) {
        if let Err(err) = result {
            warn!("tool registration failed: {err}");
            self.registration_error.get_or_insert(err);
        }
    }
}
