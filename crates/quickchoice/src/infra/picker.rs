//! Picker and prompt adapters used when a choice needs user input.

use std::collections::VecDeque;
use std::io::Write;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

/// One entry offered by [`Picker::suggest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOption {
    pub label: String,
    pub value: String,
}

impl PickOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Host picker/suggester. `None` means the user cancelled.
#[async_trait]
pub trait Picker: Send + Sync {
    async fn suggest(&self, options: &[PickOption]) -> Option<String>;

    async fn prompt(&self, header: &str) -> Option<String>;
}

/// Resolve a typed answer against the offered options: a 1-based index, a value, or a label.
fn match_answer(options: &[PickOption], answer: &str) -> Option<String> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>()
        && (1..=options.len()).contains(&index)
    {
        return Some(options[index - 1].value.clone());
    }
    options
        .iter()
        .find(|option| option.value == answer || option.label == answer)
        .map(|option| option.value.clone())
}

/// Interactive picker reading answers from stdin and writing menus to stderr.
pub struct TerminalPicker {
    input: tokio::sync::Mutex<BufReader<Stdin>>,
}

impl TerminalPicker {
    pub fn new() -> Self {
        Self {
            input: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read from stdin");
                None
            }
        }
    }
}

impl Default for TerminalPicker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Picker for TerminalPicker {
    async fn suggest(&self, options: &[PickOption]) -> Option<String> {
        {
            let mut stderr = std::io::stderr().lock();
            for (index, option) in options.iter().enumerate() {
                let _ = writeln!(stderr, "  {}) {}", index + 1, option.label);
            }
            let _ = write!(stderr, "> ");
            let _ = stderr.flush();
        }
        let answer = self.read_line().await?;
        match_answer(options, &answer)
    }

    async fn prompt(&self, header: &str) -> Option<String> {
        {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "{header}: ");
            let _ = stderr.flush();
        }
        self.read_line().await
    }
}

/// Non-interactive picker answering from a queue; an exhausted queue cancels.
#[derive(Debug, Default)]
pub struct ScriptedPicker {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPicker {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

#[async_trait]
impl Picker for ScriptedPicker {
    async fn suggest(&self, options: &[PickOption]) -> Option<String> {
        let answer = self.answers.lock().pop_front()?;
        match_answer(options, &answer)
    }

    async fn prompt(&self, _header: &str) -> Option<String> {
        self.answers.lock().pop_front()
    }
}
