//! Mission planning
//!
//! The planner asks the LLM for a JSON array of steps and defends itself
//! against the usual failure modes: surrounding prose, malformed entries,
//! unknown tools. A total parse failure yields an empty plan; the
//! executor then falls back to a single search of the objective.

use crate::prompts::plan_prompt;
use recon_llm::{GenerateOptions, LlmClient};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Closed set of tools a plan step may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    WebSearch,
    WebResearch,
    SaveToNotion,
    DispatchEmail,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::WebResearch => "web_research",
            ToolKind::SaveToNotion => "save_to_notion",
            ToolKind::DispatchEmail => "dispatch_email",
        }
    }

    pub fn is_research(&self) -> bool {
        matches!(self, ToolKind::WebSearch | ToolKind::WebResearch)
    }

    pub fn is_action(&self) -> bool {
        matches!(self, ToolKind::SaveToNotion | ToolKind::DispatchEmail)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_search" => Ok(ToolKind::WebSearch),
            "web_research" => Ok(ToolKind::WebResearch),
            "save_to_notion" => Ok(ToolKind::SaveToNotion),
            "dispatch_email" => Ok(ToolKind::DispatchEmail),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub ordinal: u32,
    pub tool: ToolKind,
    pub args: Value,
    pub thought: String,
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask for a plan. Never fails: any LLM or parse breakdown comes back
    /// as an empty plan for the caller to handle.
    pub async fn plan(&self, objective: &str) -> Vec<PlanStep> {
        let prompt = plan_prompt(objective);
        match self.llm.generate(&prompt, &GenerateOptions::default()).await {
            Ok(response) => parse_plan(&response),
            Err(e) => {
                warn!(error = %e, "plan generation failed");
                Vec::new()
            }
        }
    }
}

/// Locate the first JSON array in `text`, tolerant of surrounding prose.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the LLM response into validated steps, dropping malformed ones.
pub fn parse_plan(response: &str) -> Vec<PlanStep> {
    let Some(raw) = extract_json_array(response) else {
        warn!("no JSON array found in plan response");
        return Vec::new();
    };

    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "plan JSON did not parse");
            return Vec::new();
        }
    };

    let mut steps = Vec::new();
    for (idx, entry) in entries.into_iter().enumerate() {
        let Some(tool_name) = entry.get("tool").and_then(|t| t.as_str()) else {
            warn!(step = idx + 1, "plan step has no tool name, dropping");
            continue;
        };
        let Ok(tool) = tool_name.parse::<ToolKind>() else {
            warn!(step = idx + 1, tool = tool_name, "unknown tool in plan, dropping step");
            continue;
        };

        let ordinal = entry
            .get("step")
            .and_then(|s| s.as_u64())
            .unwrap_or(idx as u64 + 1) as u32;
        let args = entry.get("args").cloned().unwrap_or_else(|| Value::Object(Default::default()));
        if !args.is_object() {
            warn!(step = ordinal, "plan step args is not an object, dropping");
            continue;
        }
        let thought = entry
            .get("thought")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        steps.push(PlanStep {
            ordinal,
            tool,
            args,
            thought,
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_array_from_surrounding_prose() {
        let text = r#"Here is your plan:
[{"step": 1, "tool": "web_search", "args": {"query": "q"}, "thought": "t"}]
Good luck!"#;
        let raw = extract_json_array(text).unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.ends_with(']'));
        assert_eq!(parse_plan(text).len(), 1);
    }

    #[test]
    fn nested_brackets_inside_strings_do_not_confuse_extraction() {
        let text = r#"[{"step": 1, "tool": "web_search", "args": {"query": "a [b] c"}, "thought": "t"}]"#;
        assert_eq!(parse_plan(text).len(), 1);
    }

    #[test]
    fn malformed_steps_are_dropped_not_fatal() {
        let text = r#"[
            {"step": 1, "tool": "web_search", "args": {"query": "good"}, "thought": "t"},
            {"step": 2, "tool": "teleport", "args": {}, "thought": "bad tool"},
            {"step": 3, "args": {"query": "no tool"}},
            {"step": 4, "tool": "save_to_notion", "args": {"title": "T", "content": "C"}, "thought": "t"}
        ]"#;
        let plan = parse_plan(text);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].tool, ToolKind::WebSearch);
        assert_eq!(plan[1].tool, ToolKind::SaveToNotion);
    }

    #[test]
    fn garbage_yields_an_empty_plan() {
        assert!(parse_plan("I cannot help with that.").is_empty());
        assert!(parse_plan("[not json at all").is_empty());
    }

    #[test]
    fn missing_ordinals_are_filled_from_position() {
        let text = r#"[{"tool": "web_search", "args": {"query": "q"}}]"#;
        let plan = parse_plan(text);
        assert_eq!(plan[0].ordinal, 1);
        assert!(plan[0].thought.is_empty());
    }

    #[test]
    fn tool_kind_partitions() {
        assert!(ToolKind::WebSearch.is_research());
        assert!(ToolKind::WebResearch.is_research());
        assert!(ToolKind::SaveToNotion.is_action());
        assert!(ToolKind::DispatchEmail.is_action());
    }
}
