//! Tolerant parsing of LLM responses into typed drafts.
//!
//! LLMs are asked for JSON and mostly comply, but wrap it in prose,
//! markdown fences, or leave trailing commas. Extraction runs a ladder
//! of recovery strategies before giving up:
//!
//! 1. parse the trimmed text directly;
//! 2. pull the payload out of a ` ``` ` code fence and parse that;
//! 3. strip trailing commas before `}` / `]` and retry both.
//!
//! Field values get the same tolerance: enum-ish strings are matched
//! case-insensitively with common aliases, scores are clamped into
//! `1..=10`, and receiver spellings like `"none"` or `"everyone"` mean a
//! broadcast. What cannot be recovered is a [`RunnerError::Parse`]; the
//! workflow's deterministic fallback takes it from there.

use serde::Deserialize;
use serde_json::Value;

use hearthside_types::{
    ActionDraft, AgentId, ConversationKind, EmotionalState, MessageDraft, PlanDraft, PlannedStep,
    ReflectionDraft, TimeOfDay,
};

use crate::error::RunnerError;

/// Default importance when the response omits one.
const DEFAULT_IMPORTANCE: i64 = 5;

/// Receiver spellings that mean "broadcast to the shared channel".
const BROADCAST_ALIASES: &[&str] = &["", "none", "null", "all", "everyone", "group", "channel"];

// ---------------------------------------------------------------------------
// Raw response shapes (exactly what the LLM tends to emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlanResponse {
    #[serde(default, alias = "plan", alias = "actions")]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    description: String,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default, alias = "time_of_day", alias = "when")]
    slot: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawActionResponse {
    #[serde(alias = "action", alias = "summary")]
    description: String,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default, alias = "learned")]
    lesson: Option<String>,
    #[serde(default, alias = "worry")]
    concern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default, alias = "to", alias = "recipient")]
    to_agent: Option<String>,
    #[serde(default, alias = "type")]
    kind: Option<String>,
    #[serde(alias = "message", alias = "content")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawReflectionResponse {
    #[serde(alias = "reflection", alias = "takeaway")]
    content: String,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default, alias = "emotion", alias = "emotional_state")]
    mood: Option<String>,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Parse a plan-phase response.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if no strategy yields usable JSON.
pub fn parse_plan_response(raw: &str) -> Result<PlanDraft, RunnerError> {
    let value = extract_json(raw)?;
    let parsed: RawPlanResponse = serde_json::from_value(value)
        .map_err(|e| RunnerError::Parse(format!("plan response shape: {e}")))?;
    let steps = parsed
        .steps
        .into_iter()
        .filter(|step| !step.description.trim().is_empty())
        .map(|step| PlannedStep {
            description: step.description,
            priority: clamp_score(step.priority),
            slot: step
                .slot
                .as_deref()
                .and_then(parse_slot)
                .unwrap_or(TimeOfDay::Morning),
        })
        .collect();
    Ok(PlanDraft { steps })
}

/// Parse an execute-phase response.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if no strategy yields usable JSON or
/// the action has no description.
pub fn parse_action_response(raw: &str) -> Result<ActionDraft, RunnerError> {
    let value = extract_json(raw)?;
    let parsed: RawActionResponse = serde_json::from_value(value)
        .map_err(|e| RunnerError::Parse(format!("action response shape: {e}")))?;

    let message = parsed
        .message
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| MessageDraft {
            to_agent: normalize_receiver(m.to_agent),
            kind: m
                .kind
                .as_deref()
                .and_then(parse_conversation_kind)
                .unwrap_or(ConversationKind::Chat),
            text: m.text,
        });

    Ok(ActionDraft {
        description: parsed.description,
        importance: clamp_score(parsed.importance),
        message,
        lesson: parsed.lesson.filter(|s| !s.trim().is_empty()),
        concern: parsed.concern.filter(|s| !s.trim().is_empty()),
    })
}

/// Parse a reflect-phase response.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if no strategy yields usable JSON.
pub fn parse_reflection_response(raw: &str) -> Result<ReflectionDraft, RunnerError> {
    let value = extract_json(raw)?;
    let parsed: RawReflectionResponse = serde_json::from_value(value)
        .map_err(|e| RunnerError::Parse(format!("reflection response shape: {e}")))?;
    Ok(ReflectionDraft {
        content: parsed.content,
        importance: clamp_score(parsed.importance),
        mood: parsed.mood.as_deref().and_then(parse_mood),
    })
}

// ---------------------------------------------------------------------------
// JSON extraction ladder
// ---------------------------------------------------------------------------

fn extract_json(raw: &str) -> Result<Value, RunnerError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = unfence(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(fenced)
    {
        return Ok(value);
    }

    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    if let Some(fenced) = unfence(trimmed) {
        let cleaned = strip_trailing_commas(fenced);
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok(value);
        }
    }

    let snippet: String = trimmed.chars().take(120).collect();
    Err(RunnerError::Parse(format!(
        "no strategy produced JSON from: {snippet}"
    )))
}

/// Return the body of the first markdown code fence, if any.
fn unfence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = text.get(open.checked_add(3)?..)?;
    // Skip a language tag on the fence line.
    let body_start = after_open.find('\n').map_or(0, |nl| nl.saturating_add(1));
    let body = after_open.get(body_start..)?;
    let close = body.find("```")?;
    body.get(..close).map(str::trim)
}

/// Remove commas whose next non-whitespace character closes a brace or
/// bracket. Everything else, including commas inside strings, is kept
/// byte for byte.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let Some(&c) = chars.get(i) else { break };
        if c == ',' {
            let mut j = i.saturating_add(1);
            while chars.get(j).copied().is_some_and(char::is_whitespace) {
                j = j.saturating_add(1);
            }
            if matches!(chars.get(j), Some('}' | ']')) {
                i = i.saturating_add(1);
                continue;
            }
        }
        result.push(c);
        i = i.saturating_add(1);
    }
    result
}

// ---------------------------------------------------------------------------
// Field normalization
// ---------------------------------------------------------------------------

fn clamp_score(raw: Option<i64>) -> u8 {
    u8::try_from(raw.unwrap_or(DEFAULT_IMPORTANCE).clamp(1, 10)).unwrap_or(5)
}

fn normalize_receiver(raw: Option<String>) -> Option<AgentId> {
    let name = raw?;
    let lowered = name.trim().to_lowercase();
    if BROADCAST_ALIASES.contains(&lowered.as_str()) {
        None
    } else {
        Some(AgentId::from(lowered))
    }
}

fn parse_conversation_kind(raw: &str) -> Option<ConversationKind> {
    match raw.trim().to_lowercase().as_str() {
        "chat" | "group_chat" | "private_chat" => Some(ConversationKind::Chat),
        "help_request" | "help" => Some(ConversationKind::HelpRequest),
        "advice" => Some(ConversationKind::Advice),
        "share" | "content_sharing" | "sharing" => Some(ConversationKind::Share),
        _ => None,
    }
}

fn parse_slot(raw: &str) -> Option<TimeOfDay> {
    TimeOfDay::parse(&raw.trim().to_lowercase())
}

fn parse_mood(raw: &str) -> Option<EmotionalState> {
    EmotionalState::parse(&raw.trim().to_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_plan_json() {
        let raw = r#"{"steps": [
            {"description": "ask the group about teething", "priority": 8, "slot": "morning"},
            {"description": "watch a weaning video", "priority": 4, "slot": "afternoon"}
        ]}"#;
        let draft = parse_plan_response(raw).unwrap();
        assert_eq!(draft.steps.len(), 2);
        assert_eq!(draft.steps[0].priority, 8);
        assert_eq!(draft.steps[1].slot, TimeOfDay::Afternoon);
    }

    #[test]
    fn plan_tolerates_missing_priority_and_slot() {
        let raw = r#"{"steps": [{"description": "tidy up"}]}"#;
        let draft = parse_plan_response(raw).unwrap();
        assert_eq!(draft.steps[0].priority, 5);
        assert_eq!(draft.steps[0].slot, TimeOfDay::Morning);
    }

    #[test]
    fn plan_accepts_actions_alias_and_drops_blank_steps() {
        let raw = r#"{"actions": [{"description": "   "}, {"description": "real step"}]}"#;
        let draft = parse_plan_response(raw).unwrap();
        assert_eq!(draft.steps.len(), 1);
        assert_eq!(draft.steps[0].description, "real step");
    }

    #[test]
    fn parses_action_from_code_fence() {
        let raw = "Here is what I'll do:\n```json\n{\"description\": \"share the lullaby video\", \"importance\": 6, \"message\": {\"to\": \"none\", \"kind\": \"share\", \"text\": \"this one worked for us\"}}\n```\nHope that helps.";
        let draft = parse_action_response(raw).unwrap();
        assert_eq!(draft.description, "share the lullaby video");
        let message = draft.message.unwrap();
        assert!(message.to_agent.is_none());
        assert_eq!(message.kind, ConversationKind::Share);
    }

    #[test]
    fn action_with_trailing_comma_recovers() {
        let raw = r#"{"description": "rested for a while", "importance": 2,}"#;
        let draft = parse_action_response(raw).unwrap();
        assert_eq!(draft.description, "rested for a while");
    }

    #[test]
    fn action_importance_is_clamped() {
        let raw = r#"{"description": "big moment", "importance": 99}"#;
        let draft = parse_action_response(raw).unwrap();
        assert_eq!(draft.importance, 10);
    }

    #[test]
    fn directed_receiver_is_lowercased() {
        let raw = r#"{"description": "checked in on Lian", "message": {"to": "Lian", "kind": "chat", "text": "how is the fever?"}}"#;
        let draft = parse_action_response(raw).unwrap();
        assert_eq!(
            draft.message.unwrap().to_agent,
            Some(AgentId::from("lian"))
        );
    }

    #[test]
    fn empty_message_text_means_no_message() {
        let raw = r#"{"description": "kept to myself", "message": {"to": "lian", "kind": "chat", "text": "  "}}"#;
        let draft = parse_action_response(raw).unwrap();
        assert!(draft.message.is_none());
    }

    #[test]
    fn unknown_message_kind_defaults_to_chat() {
        let raw = r#"{"description": "said hello", "message": {"kind": "banter", "text": "hello"}}"#;
        let draft = parse_action_response(raw).unwrap();
        assert_eq!(draft.message.unwrap().kind, ConversationKind::Chat);
    }

    #[test]
    fn parses_reflection_with_mood_alias() {
        let raw = r#"{"reflection": "today wore me out", "importance": 6, "emotion": "Tired"}"#;
        let draft = parse_reflection_response(raw).unwrap();
        assert_eq!(draft.content, "today wore me out");
        assert_eq!(draft.mood, Some(EmotionalState::Tired));
    }

    #[test]
    fn prose_without_json_is_a_parse_error() {
        let raw = "I think I will go check on the baby and then rest.";
        assert!(parse_action_response(raw).is_err());
        assert!(parse_plan_response(raw).is_err());
        assert!(parse_reflection_response(raw).is_err());
    }

    #[test]
    fn strip_trailing_commas_handles_nested_structures() {
        let input = r#"{"a": [1, 2,], "b": {"c": 3,},}"#;
        let cleaned = strip_trailing_commas(input);
        assert_eq!(cleaned, r#"{"a": [1, 2], "b": {"c": 3}}"#);
        assert!(serde_json::from_str::<Value>(&cleaned).is_ok());
    }

    #[test]
    fn unfence_handles_plain_and_tagged_fences() {
        assert_eq!(
            unfence("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(unfence("```\n{\"a\": 1}\n```"), Some("{\"a\": 1}"));
        assert_eq!(unfence("no fences here"), None);
    }
}
