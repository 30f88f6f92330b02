//! Agent module - the step loop that drives the model.
//!
//! The model answers in a JSON step protocol, one step per reply:
//! 1. `plan` / `think` / `validate` steps are recorded and the loop continues
//! 2. an `action` step names a tool; its result is fed back as an `observe` step
//! 3. an `output` or `result` step answers the user and ends the query
//!
//! The [`Session`] transcript persists across queries until the user leaves.

mod agent_loop;
mod conversation;
mod prompt;
mod step;

pub use agent_loop::{Agent, AgentError, AgentEvent, Session, TurnOutcome};
pub use conversation::{Conversation, Message, Role};
pub use prompt::{build_system_prompt, PromptProfile};
pub use step::{observation_envelope, parse_step, StepError, StepKind, StepRecord};
