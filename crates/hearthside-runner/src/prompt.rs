//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates live on disk (default `templates/`) so persona and prompt
//! wording can be tuned without recompiling. Each reasoning phase has its
//! own user template; a shared system template establishes the agent's
//! identity. The rendering context is the serialized phase context
//! (profile, observation, plan, memories), so templates can reach any
//! field of it.

use minijinja::Environment;

use crate::error::RunnerError;

/// Which reasoning phase a prompt is being rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Drafting a daily plan.
    Plan,
    /// Realizing an action.
    Action,
    /// Composing a reflection.
    Reflect,
}

impl PromptKind {
    /// Template name for this phase.
    const fn template_name(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Action => "action",
            Self::Reflect => "reflect",
        }
    }
}

/// The complete rendered prompt ready for an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing who the agent is.
    pub system: String,
    /// User message for the current phase.
    pub user: String,
}

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The template files the engine expects in its directory.
const TEMPLATE_FILES: &[(&str, &str)] = &[
    ("system", "system.j2"),
    ("plan", "plan.j2"),
    ("action", "action.j2"),
    ("reflect", "reflect.j2"),
];

impl PromptEngine {
    /// Load all templates from a directory.
    ///
    /// The directory must contain `system.j2`, `plan.j2`, `action.j2`,
    /// and `reflect.j2`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if a file is missing or does not
    /// parse as a template.
    pub fn new(templates_dir: &str) -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        for (name, filename) in TEMPLATE_FILES {
            let path = format!("{templates_dir}/{filename}");
            let source = std::fs::read_to_string(&path)
                .map_err(|e| RunnerError::Template(format!("failed to read {path}: {e}")))?;
            env.add_template_owned((*name).to_owned(), source)
                .map_err(|e| RunnerError::Template(format!("failed to parse {path}: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the system and phase prompts for the given context.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if rendering fails.
    pub fn render(
        &self,
        kind: PromptKind,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, RunnerError> {
        let system = self.render_one("system", context)?;
        let user = self.render_one(kind.template_name(), context)?;
        Ok(RenderedPrompt { system, user })
    }

    fn render_one(&self, name: &str, context: &serde_json::Value) -> Result<String, RunnerError> {
        self.env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing template {name}: {e}")))?
            .render(context)
            .map_err(|e| RunnerError::Template(format!("render of {name} failed: {e}")))
    }
}
