use std::time::Duration;

use chrono::{Local, NaiveDate};
use itinera_core::conversation::Message;
use itinera_core::planner::ModelPlanner;
use itinera_core::tool::RegistryError;
use itinera_core::{
    Agent, AgentBuilder, ConversationError, ConversationOutcome, Stage,
};
use itinera_model::ModelProvider;
use itinera_openai_model::OpenAIProvider;

use crate::config::Config;
use crate::tools::*;

const SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

type DeltaFn = Box<dyn Fn(String) + Send + Sync>;
type StageFn = Box<dyn Fn(Stage) + Send + Sync>;
type MessageFn = Box<dyn Fn(&Message) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    planner: ModelPlanner,
    system_prompt: Option<String>,
    today: NaiveDate,
    max_turns: Option<usize>,
    planner_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    on_delta: Option<DeltaFn>,
    on_stage_change: Option<StageFn>,
    on_message: Option<MessageFn>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        Self {
            planner: ModelPlanner::new(provider),
            system_prompt: None,
            today: Local::now().date_naive(),
            max_turns: None,
            planner_timeout: None,
            tool_timeout: None,
            on_delta: None,
            on_stage_change: None,
            on_message: None,
        }
    }

    /// Creates a session builder from a validated configuration.
    pub fn with_config(config: &Config) -> Self {
        let provider = OpenAIProvider::new(config.to_openai_config());
        let mut builder = Self::with_model_provider(provider);
        builder.max_turns = Some(config.max_turns);
        builder.planner_timeout = config.planner_timeout;
        builder.tool_timeout = config.tool_timeout;
        builder
    }

    /// Replaces the built-in travel assistant prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the date tools treat as today.
    #[inline]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Sets the maximum number of planner turns per message.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Sets the limit for a single planner reply.
    #[inline]
    pub fn with_planner_timeout(mut self, timeout: Duration) -> Self {
        self.planner_timeout = Some(timeout);
        self
    }

    /// Sets the limit for a single tool call.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Attaches a callback receiving the planner's text while it streams.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        self.on_delta = Some(Box::new(on_delta));
        self
    }

    /// Attaches a callback invoked on every stage transition.
    #[inline]
    pub fn on_stage_change(
        mut self,
        on_stage_change: impl Fn(Stage) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage_change = Some(Box::new(on_stage_change));
        self
    }

    /// Attaches a callback invoked for every message of the chat history.
    #[inline]
    pub fn on_message(
        mut self,
        on_message: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Box::new(on_message));
        self
    }

    /// Builds a new session with the travel tools registered.
    pub fn build(self) -> Result<Session, RegistryError> {
        let system_prompt = self.system_prompt.unwrap_or_else(|| {
            SYSTEM_PROMPT.replace("{{TODAY}}", &self.today.to_string())
        });
        let mut planner = self.planner.with_system_prompt(system_prompt);
        if let Some(on_delta) = self.on_delta {
            planner = planner.on_delta(on_delta);
        }

        let mut agent_builder = AgentBuilder::with_planner(planner)
            .with_tool(FlightStatusTool::new(self.today))
            .with_tool(FlightPriceTool::new())
            .with_tool(HotelDetailsTool::new())
            .with_tool(LocationInfoTool::new(self.today));
        if let Some(max_turns) = self.max_turns {
            agent_builder = agent_builder.with_max_turns(max_turns);
        }
        if let Some(timeout) = self.planner_timeout {
            agent_builder = agent_builder.with_planner_timeout(timeout);
        }
        if let Some(timeout) = self.tool_timeout {
            agent_builder = agent_builder.with_tool_timeout(timeout);
        }
        if let Some(on_stage_change) = self.on_stage_change {
            agent_builder = agent_builder.on_stage_change(on_stage_change);
        }
        if let Some(on_message) = self.on_message {
            agent_builder = agent_builder.on_message(on_message);
        }

        Ok(Session {
            agent: agent_builder.build()?,
        })
    }
}

/// A chat session with the travel assistant.
///
/// The session holds a fully configured agent that you can use directly, and
/// it is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Sends a message and waits until the assistant is done with it.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<ConversationOutcome, ConversationError> {
        self.agent.submit(message).await
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
