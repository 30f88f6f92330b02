//! System prompt templates for the agent.

use std::fmt;
use std::str::FromStr;

use crate::tools::{ToolKind, ToolRegistry};

/// Which step protocol the session instructs the model to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptProfile {
    /// plan / action / observe / output with the developer tools
    #[default]
    Coding,
    /// analyse / think / validate / result, no tools
    Reasoning,
    /// plan / action / observe / output with the weather lookup
    Weather,
    /// Free-text chat in character, no step protocol
    Persona,
}

impl PromptProfile {
    /// Tools advertised to, and dispatchable by, sessions of this profile.
    pub fn tools(&self) -> &'static [ToolKind] {
        match self {
            PromptProfile::Coding => &ToolKind::CODING,
            PromptProfile::Weather => &[ToolKind::GetWeather, ToolKind::RunCommand],
            PromptProfile::Reasoning | PromptProfile::Persona => &[],
        }
    }

    /// Whether the model replies in plain text instead of JSON steps.
    pub fn is_chat(&self) -> bool {
        matches!(self, PromptProfile::Persona)
    }
}

impl FromStr for PromptProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coding" => Ok(PromptProfile::Coding),
            "reasoning" => Ok(PromptProfile::Reasoning),
            "weather" => Ok(PromptProfile::Weather),
            "persona" => Ok(PromptProfile::Persona),
            other => Err(format!(
                "unknown profile '{}' (expected coding, reasoning, weather or persona)",
                other
            )),
        }
    }
}

impl fmt::Display for PromptProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptProfile::Coding => write!(f, "coding"),
            PromptProfile::Reasoning => write!(f, "reasoning"),
            PromptProfile::Weather => write!(f, "weather"),
            PromptProfile::Persona => write!(f, "persona"),
        }
    }
}

/// Build the instruction message that opens every conversation.
pub fn build_system_prompt(profile: PromptProfile, workspace_path: &str, tools: &ToolRegistry) -> String {
    match profile {
        PromptProfile::Coding => coding_prompt(workspace_path, &tool_descriptions(profile, tools)),
        PromptProfile::Reasoning => REASONING_PROMPT.to_string(),
        PromptProfile::Weather => weather_prompt(&tool_descriptions(profile, tools)),
        PromptProfile::Persona => PERSONA_PROMPT.to_string(),
    }
}

fn tool_descriptions(profile: PromptProfile, tools: &ToolRegistry) -> String {
    tools
        .list_tools(profile.tools())
        .iter()
        .map(|t| format!("- **{}**: {}\n  input: {}", t.name, t.description, t.usage))
        .collect::<Vec<_>>()
        .join("\n")
}

fn coding_prompt(workspace_path: &str, tool_descriptions: &str) -> String {

    format!(
        r#"You are an expert fullstack developer assistant. You build complete web applications on the local machine, working in the directory: {workspace_path}

You work in a structured cycle: PLAN -> ACTION -> OBSERVE -> (plan again if needed) -> OUTPUT.
Break the request into logical tasks, pick the right tool for each, look at what it returned, and only answer once the work is verified.

## Available Tools

{tool_descriptions}

## Response Format

Every reply is exactly ONE JSON object, one step at a time:

{{"step": "plan" | "action" | "output", "content": "what you are doing, what you observed, or your answer", "function": "tool name, only for action", "input": "tool input, only for action"}}

After an action you receive {{"step": "observe", "output": ...}} with the tool result. Results starting with "[ERROR]" mean the tool failed; read the reason and adjust.

## Rules

1. Plan before you act, and act one tool call at a time.
2. Read files before changing them, unless you are creating them.
3. Use relative paths; they resolve against the working directory.
4. When something fails, fix the cause instead of repeating the same call.
5. Finish with an "output" step that summarizes what was built and how to run it.

## Example

{{"step": "plan", "content": "The user wants a utility module. I will write src/utils/format.js."}}
{{"step": "action", "function": "write_file", "content": "Creating the utility", "input": "src/utils/format.js|||export const formatDate = (d) => new Date(d).toLocaleDateString();"}}
{{"step": "observe", "output": "Successfully wrote to src/utils/format.js"}}
{{"step": "output", "content": "Created src/utils/format.js exporting formatDate."}}"#,
        workspace_path = workspace_path,
        tool_descriptions = tool_descriptions
    )
}

fn weather_prompt(tool_descriptions: &str) -> String {
    format!(
        r#"You are an assistant who breaks a user query down and resolves it with the tools below.
You work in plan, action, observe mode: plan step by step, pick the relevant tool, call it with an action step, wait for the observation, then answer.

## Available Tools

{tool_descriptions}

## Rules

1. Reply with exactly ONE JSON object per message and wait for the next input.
2. Carefully analyse the user query before acting.

Format: {{"step": "plan" | "action" | "output", "content": "string", "function": "tool name, only for action", "input": "tool input, only for action"}}

## Example

User: What is the weather of new york?
{{"step": "plan", "content": "The user is interested in weather data of new york"}}
{{"step": "plan", "content": "From the available tools I should call get_weather"}}
{{"step": "action", "function": "get_weather", "content": "Looking up new york", "input": "new york"}}
{{"step": "observe", "output": "The weather in new york is Clear +12°C."}}
{{"step": "output", "content": "The weather for new york seems to be clear and 12 degrees."}}"#,
        tool_descriptions = tool_descriptions
    )
}

const PERSONA_PROMPT: &str = r#"You are a friendly tech YouTuber who teaches web development and data science on a channel built around chai and code. You are chill and fun, you teach through stories, and you often open a coding session with "chai aap tyaar kar lijiye, code hum kar lete hain".

Example:
Input: How are you?
Output: Haanji! Hum bilkul thik hai ji, aap batao aap kaise ho? Chai peeke coding kar rahe hai 😄

Rules:
- Always reply in this tone and voice.
- Use Hinglish (English with Hindi words in English script).
- Don't break character.
- Reply in plain text, one message at a time, and wait for the user."#;

const REASONING_PROMPT: &str = r#"You are an assistant who breaks complex problems down and then resolves the user query.

Follow these steps:
1. Analyse the user input.
2. Think step by step about how you would solve it.
3. Think again from another perspective.
4. Validate the candidate solution.
5. Give the final result.

Respond only with one JSON object per reply: {"step": "analyse" | "think" | "validate" | "result", "content": "string"}
Perform one step at a time and wait for the next input.

Example for "What is 2 + 2?":
{"step": "analyse", "content": "The user asks a basic arithmetic question."}
{"step": "think", "content": "Adding the operands from left to right gives 4."}
{"step": "validate", "content": "4 is the correct answer for 2 + 2."}
{"step": "result", "content": "2 + 2 = 4"}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolKind, ToolLimits};
    use std::path::PathBuf;

    #[test]
    fn coding_prompt_lists_every_dispatchable_tool() {
        let tools = ToolRegistry::new(PathBuf::from("/work"), ToolLimits::default());
        let prompt = build_system_prompt(PromptProfile::Coding, "/work", &tools);

        assert!(prompt.contains("/work"));
        for kind in ToolKind::CODING {
            assert!(prompt.contains(&format!("- **{}**:", kind.name())), "missing {}", kind.name());
        }
        assert!(!prompt.contains("get_weather"));
    }

    #[test]
    fn weather_prompt_offers_only_its_own_tools() {
        let tools = ToolRegistry::new(PathBuf::from("/work"), ToolLimits::default());
        let prompt = build_system_prompt(PromptProfile::Weather, "/work", &tools);

        assert!(prompt.contains("- **get_weather**:"));
        assert!(prompt.contains("- **run_command**:"));
        assert!(!prompt.contains("- **write_file**:"));
    }

    #[test]
    fn persona_prompt_is_plain_chat() {
        let tools = ToolRegistry::new(PathBuf::from("/work"), ToolLimits::default());
        let prompt = build_system_prompt(PromptProfile::Persona, "/work", &tools);
        assert!(prompt.contains("Hinglish"));
        assert!(!prompt.contains(r#""step""#));
        assert!(PromptProfile::Persona.is_chat());
        assert!(PromptProfile::Persona.tools().is_empty());
    }

    #[test]
    fn reasoning_prompt_has_no_tools() {
        let tools = ToolRegistry::new(PathBuf::from("/work"), ToolLimits::default());
        let prompt = build_system_prompt(PromptProfile::Reasoning, "/work", &tools);
        assert!(prompt.contains(r#""step": "analyse""#));
        assert!(!prompt.contains("write_file"));
    }

    #[test]
    fn profile_parses_from_flag_value() {
        assert_eq!("Reasoning".parse::<PromptProfile>(), Ok(PromptProfile::Reasoning));
        assert_eq!("weather".parse::<PromptProfile>(), Ok(PromptProfile::Weather));
        assert_eq!(" persona ".parse::<PromptProfile>(), Ok(PromptProfile::Persona));
        assert!("poetry".parse::<PromptProfile>().is_err());
    }
}
