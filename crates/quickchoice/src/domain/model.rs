//! Domain models for choices, macro commands, and user settings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a choice or macro command.
pub type ChoiceId = String;

/// Values bound during one invocation, visible to every later step and format string.
pub type Variables = BTreeMap<String, String>;

/// A user-defined action. The variant is fixed at creation; only its settings can be edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    id: ChoiceId,
    pub name: String,
    /// Whether an invokable command should be registered for this choice.
    #[serde(default)]
    pub command: bool,
    #[serde(flatten)]
    kind: ChoiceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChoiceKind {
    Template(TemplateChoice),
    Capture(CaptureChoice),
    Macro(MacroChoice),
    Multi(MultiChoice),
}

impl Choice {
    /// Create a choice with a freshly generated id.
    pub fn new(name: impl Into<String>, kind: ChoiceKind) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, kind)
    }

    pub fn with_id(id: impl Into<ChoiceId>, name: impl Into<String>, kind: ChoiceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            command: false,
            kind,
        }
    }

    /// Mark whether the choice should be exposed as a command.
    pub fn with_command(mut self, command: bool) -> Self {
        self.command = command;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ChoiceKind {
        &self.kind
    }

    /// Children of a `Multi` container, empty for leaf choices.
    pub fn children(&self) -> &[Choice] {
        match &self.kind {
            ChoiceKind::Multi(multi) => &multi.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Choice>> {
        match &mut self.kind {
            ChoiceKind::Multi(multi) => Some(&mut multi.children),
            _ => None,
        }
    }

    pub fn template_mut(&mut self) -> Option<&mut TemplateChoice> {
        match &mut self.kind {
            ChoiceKind::Template(template) => Some(template),
            _ => None,
        }
    }

    pub fn capture_mut(&mut self) -> Option<&mut CaptureChoice> {
        match &mut self.kind {
            ChoiceKind::Capture(capture) => Some(capture),
            _ => None,
        }
    }

    pub fn macro_mut(&mut self) -> Option<&mut MacroChoice> {
        match &mut self.kind {
            ChoiceKind::Macro(macro_choice) => Some(macro_choice),
            _ => None,
        }
    }
}

impl ChoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceKind::Template(_) => "template",
            ChoiceKind::Capture(_) => "capture",
            ChoiceKind::Macro(_) => "macro",
            ChoiceKind::Multi(_) => "multi",
        }
    }
}

impl fmt::Display for ChoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates a new document from a template file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChoice {
    pub template_path: String,
    /// Format string producing the new file name (without extension).
    pub file_name_format: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub on_exists: FileExistsBehavior,
}

/// What a template choice does when its target file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileExistsBehavior {
    /// Append ` 1`, ` 2`, ... to the file name until it is free.
    #[default]
    Increment,
    Overwrite,
    Append,
    Fail,
}

/// Writes captured input into an existing (or new) document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureChoice {
    /// Format string producing the target file path.
    pub capture_to: String,
    #[serde(default = "CaptureChoice::default_format")]
    pub format: String,
    #[serde(default)]
    pub prepend: bool,
    #[serde(default)]
    pub create_file_if_missing: bool,
    #[serde(default)]
    pub insert_after: Option<InsertAfter>,
}

impl CaptureChoice {
    pub fn default_format() -> String {
        "{{ value }}\n".into()
    }

    pub fn new(capture_to: impl Into<String>) -> Self {
        Self {
            capture_to: capture_to.into(),
            format: Self::default_format(),
            prepend: false,
            create_file_if_missing: false,
            insert_after: None,
        }
    }
}

/// Anchor a capture below a heading instead of the start or end of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAfter {
    /// Format string for the heading line to look for (matched after trimming).
    pub heading: String,
    /// Insert after the last line of the heading's section rather than right below it.
    #[serde(default)]
    pub insert_at_end_of_section: bool,
    #[serde(default)]
    pub consider_subsections: bool,
    /// Append the heading to the document when it is missing.
    #[serde(default)]
    pub create_if_not_found: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroChoice {
    #[serde(default)]
    pub commands: Vec<MacroCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiChoice {
    #[serde(default)]
    pub children: Vec<Choice>,
    #[serde(default)]
    pub collapsed: bool,
}

/// One step of a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroCommand {
    id: ChoiceId,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl MacroCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind)
    }

    pub fn with_id(id: impl Into<ChoiceId>, kind: CommandKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandKind {
    /// Run another choice from the tree.
    #[serde(rename_all = "camelCase")]
    Choice { choice_id: ChoiceId },
    /// Run an external program; its trimmed stdout may be bound to a variable.
    #[serde(rename_all = "camelCase")]
    UserScript {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        output_variable: Option<String>,
    },
    AiAssistant(AiAssistantCommand),
    #[serde(rename_all = "camelCase")]
    Wait { duration_ms: u64 },
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Choice { .. } => "choice",
            CommandKind::UserScript { .. } => "userScript",
            CommandKind::AiAssistant(_) => "aiAssistant",
            CommandKind::Wait { .. } => "wait",
        }
    }
}

/// Sends a formatted prompt template to the AI provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAssistantCommand {
    /// Model override; falls back to [`AiSettings::default_model`].
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Prompt template picked automatically by name. `None` asks the user.
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default = "AiAssistantCommand::default_output_variable")]
    pub output_variable: String,
}

impl AiAssistantCommand {
    pub fn default_output_variable() -> String {
        "output".into()
    }
}

impl Default for AiAssistantCommand {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            prompt_template: None,
            output_variable: Self::default_output_variable(),
        }
    }
}

/// Process-wide user settings: the choice tree plus assistant defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub ai: AiSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default = "AiSettings::default_model")]
    pub default_model: String,
    #[serde(default = "AiSettings::default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default = "AiSettings::default_prompt_templates_folder")]
    pub prompt_templates_folder: String,
}

impl AiSettings {
    fn default_model() -> String {
        "gpt-4o-mini".into()
    }

    fn default_system_prompt() -> String {
        "You are a helpful writing assistant. Answer with markdown only.".into()
    }

    fn default_prompt_templates_folder() -> String {
        "prompts".into()
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            default_model: Self::default_model(),
            default_system_prompt: Self::default_system_prompt(),
            prompt_templates_folder: Self::default_prompt_templates_folder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_json() {
        let json = r#"{
            "choices": [
                {
                    "id": "m1",
                    "name": "Inbox",
                    "type": "multi",
                    "command": true,
                    "children": [
                        { "id": "c1", "name": "Log", "type": "capture", "captureTo": "log.md" }
                    ]
                },
                {
                    "id": "mac",
                    "name": "Summarize",
                    "type": "macro",
                    "commands": [
                        { "id": "s1", "type": "aiAssistant", "promptTemplate": "summary" },
                        { "id": "s2", "type": "wait", "durationMs": 10 }
                    ]
                }
            ]
        }"#;

        let settings: Settings = serde_json::from_str(json).expect("parse settings");
        let inbox = &settings.choices[0];
        assert!(inbox.command);
        assert_eq!(inbox.kind().as_str(), "multi");
        assert_eq!(inbox.children()[0].id(), "c1");
        match inbox.children()[0].kind() {
            ChoiceKind::Capture(capture) => {
                assert_eq!(capture.format, "{{ value }}\n");
                assert!(capture.insert_after.is_none());
            }
            other => panic!("unexpected kind {other}"),
        }

        match settings.choices[1].kind() {
            ChoiceKind::Macro(macro_choice) => {
                assert_eq!(macro_choice.commands.len(), 2);
                assert_eq!(
                    macro_choice.commands[0].kind,
                    CommandKind::AiAssistant(AiAssistantCommand {
                        prompt_template: Some("summary".into()),
                        ..AiAssistantCommand::default()
                    })
                );
            }
            other => panic!("unexpected kind {other}"),
        }
        assert_eq!(settings.ai, AiSettings::default());

        let encoded = serde_json::to_string(&settings).expect("encode");
        let decoded: Settings = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, settings);
    }

    #[test]
    fn new_choices_get_distinct_ids() {
        let a = Choice::new("a", ChoiceKind::Macro(MacroChoice::default()));
        let b = Choice::new("a", ChoiceKind::Macro(MacroChoice::default()));
        assert_ne!(a.id(), b.id());
        assert!(a.children().is_empty());
    }
}
