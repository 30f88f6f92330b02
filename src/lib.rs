//! # stepwise
//!
//! A terminal coding agent that drives a hosted model through a JSON step
//! protocol and executes local developer tools on its behalf.
//!
//! This library provides:
//! - The step loop with bounded retries and a persistent session transcript
//! - A fixed catalog of tools (shell, files, search, HTTP, SQLite, scaffolding)
//! - A Gemini `generateContent` client behind the [`llm::LlmClient`] trait
//!
//! ## Architecture
//!
//! Each user query runs an inner loop:
//! 1. Send the transcript to the model and parse its reply as one step
//! 2. Record `plan`/`think` steps, run the tool named by an `action` step
//! 3. Feed the tool result back as an `observe` step
//! 4. Stop on `output`, on an unusable reply, or at the step limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stepwise::{agent::{Agent, PromptProfile}, llm::GeminiClient, Config};
//!
//! let config = Config::from_env()?;
//! let llm = GeminiClient::new(config.api_key.clone(), config.api_host.clone(), config.model.clone())?;
//! let agent = Agent::new(&config, Arc::new(llm));
//! let mut session = agent.new_session(PromptProfile::Coding);
//! let outcome = agent.run_query(&mut session, "Create a hello world script", &mut |_| {}).await?;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod pkg_manager;
pub mod tools;

pub use config::Config;
