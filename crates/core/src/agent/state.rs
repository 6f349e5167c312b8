use itinera_model::ModelTool;
use serde::Serialize;
use tokio::time::timeout;

use super::{Agent, ConversationError, ConversationOutcome, TerminationReason};
use crate::conversation::{Message, Role, Transcript};
use crate::planner::{PlannerError, PlannerReply};
use crate::termination::strip_marker;

/// Where a conversation currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the planner's next reply.
    #[default]
    AwaitingPlan,
    /// Running the tool calls of the latest planner reply.
    ExecutingTool,
    /// The conversation is over.
    Terminated,
}

/// The state of one conversation on an [`Agent`].
pub(super) struct Run<'a> {
    agent: &'a Agent,
    tools: Vec<ModelTool>,
    transcript: Transcript,
    stage: Stage,
    turns: usize,
}

impl<'a> Run<'a> {
    pub(super) fn new(agent: &'a Agent, opening: Message) -> Self {
        let mut run = Self {
            agent,
            tools: agent.registry().definitions(),
            transcript: Transcript::default(),
            stage: Stage::AwaitingPlan,
            turns: 0,
        };
        run.notify_stage();
        run.append(opening);
        run
    }

    pub(super) async fn run(
        mut self,
    ) -> Result<ConversationOutcome, ConversationError> {
        loop {
            if self.turns >= self.agent.max_turns {
                let limit = self.agent.max_turns;
                info!("turn limit reached after {} turn(s)", self.turns);
                return Ok(
                    self.finish(TerminationReason::TurnLimitExceeded { limit })
                );
            }
            self.turns += 1;
            trace!("turn {} started", self.turns);

            let reply = match self.request_plan().await {
                Ok(reply) => reply,
                Err(err) => {
                    error!("planner failed on turn {}: {err}", self.turns);
                    return Err(ConversationError::PlannerUnavailable {
                        source: err,
                        transcript: self.transcript,
                    });
                }
            };

            let tool_calls = reply.tool_calls.clone();
            let msg = Message::planner_reply(reply);
            let terminal = self.is_terminal(&msg);
            self.append(msg);
            if terminal {
                debug!("termination detected on turn {}", self.turns);
                return Ok(self.finish(TerminationReason::Detected));
            }
            if tool_calls.is_empty() {
                self.enter(Stage::AwaitingPlan);
                continue;
            }

            self.enter(Stage::ExecutingTool);
            for call in tool_calls {
                let result = self
                    .agent
                    .invoker
                    .invoke(&call.name, call.arguments.clone())
                    .await;
                if let Some(err) = result.error() {
                    debug!("tool `{}` ({}) failed: {err}", call.name, call.id);
                }
                self.append(Message::tool_response(call, result));
            }
            self.enter(Stage::AwaitingPlan);
        }
    }

    async fn request_plan(&self) -> Result<PlannerReply, PlannerError> {
        let plan = self.agent.planner.plan(&self.transcript, &self.tools);
        match self.agent.planner_timeout {
            Some(limit) => timeout(limit, plan)
                .await
                .map_err(|_| PlannerError::Timeout(limit))?,
            None => plan.await,
        }
    }

    fn is_terminal(&self, msg: &Message) -> bool {
        match self.agent.detector.is_terminal(msg) {
            Ok(terminal) => terminal,
            Err(err) => {
                warn!("termination check failed, continuing: {err}");
                false
            }
        }
    }

    fn append(&mut self, msg: Message) {
        if let Some(on_message) = &self.agent.on_message {
            on_message(&msg);
        }
        self.transcript.push(msg);
    }

    fn enter(&mut self, stage: Stage) {
        trace!("stage: {:?} -> {stage:?}", self.stage);
        self.stage = stage;
        self.notify_stage();
    }

    fn notify_stage(&self) {
        if let Some(on_stage_change) = &self.agent.on_stage_change {
            on_stage_change(self.stage);
        }
    }

    fn finish(mut self, reason: TerminationReason) -> ConversationOutcome {
        self.enter(Stage::Terminated);
        let agent = self.agent;
        let marker = agent.detector.completion_marker();
        let summary = summarize(&self.transcript, marker);
        ConversationOutcome {
            transcript: self.transcript,
            summary,
            reason,
            turns: self.turns,
        }
    }
}

/// The last planner text without the detector's marker. Falls back to the
/// latest planner text that is not empty once stripped.
fn summarize(transcript: &Transcript, marker: Option<&str>) -> String {
    let mut planner_texts = transcript
        .iter()
        .rev()
        .filter(|msg| msg.role() == Role::Planner)
        .filter_map(|msg| msg.content().as_text())
        .map(|text| strip_marker(text, marker.unwrap_or_default()));
    let Some(last) = planner_texts.next() else {
        return String::new();
    };
    if !last.is_empty() {
        return last;
    }
    planner_texts
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}
