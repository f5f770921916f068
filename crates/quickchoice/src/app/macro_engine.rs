//! Sequential execution of macro commands.

use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::Instrument;

use crate::app::assistant;
use crate::app::executor::ChoiceExecutor;
use crate::app::script;
use crate::domain::model::{CommandKind, MacroCommand, Variables};
use crate::domain::tree::ChoiceLookup;

/// The step that stopped a macro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step_index: usize,
    pub command_id: String,
    pub message: String,
}

/// Result of one macro run: how many steps finished and what stopped it, if anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroOutcome {
    pub completed: usize,
    pub failure: Option<StepFailure>,
}

impl MacroOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// A nested macro stopped; its failure has already been reported.
#[derive(Debug, Error)]
#[error("macro '{name}' stopped at step {step}: {message}")]
pub(crate) struct MacroAborted {
    pub name: String,
    /// 1-based, as shown to users.
    pub step: usize,
    pub message: String,
}

impl MacroAborted {
    pub fn new(name: impl Into<String>, failure: StepFailure) -> Self {
        Self {
            name: name.into(),
            step: failure.step_index + 1,
            message: failure.message,
        }
    }
}

/// A step failure the step already showed to the user; the engine only logs it.
#[derive(Debug, Error)]
#[error("{0:#}")]
pub(crate) struct AlreadyReported(anyhow::Error);

impl AlreadyReported {
    pub fn wrap(err: anyhow::Error) -> anyhow::Error {
        anyhow::Error::new(Self(err))
    }
}

/// Runs the commands of a macro in order, each awaited before the next starts.
pub struct MacroEngine<'a> {
    executor: &'a ChoiceExecutor,
}

impl<'a> MacroEngine<'a> {
    pub fn new(executor: &'a ChoiceExecutor) -> Self {
        Self { executor }
    }

    /// Run `commands` against `variables`. The first failing step is reported and ends the run;
    /// later steps never start and the error is not returned to the caller.
    pub async fn run(
        &self,
        commands: &[MacroCommand],
        variables: &mut Variables,
        depth: usize,
    ) -> MacroOutcome {
        let mut outcome = MacroOutcome::default();

        for (index, command) in commands.iter().enumerate() {
            let span = tracing::info_span!(
                "macro_step",
                step = index,
                command = command.id(),
                kind = command.kind.as_str()
            );
            match self.run_step(command, variables, depth).instrument(span).await {
                Ok(()) => outcome.completed += 1,
                Err(err) => {
                    if !err.is::<MacroAborted>() {
                        self.report(index, command, &err, !err.is::<AlreadyReported>());
                    }
                    outcome.failure = Some(StepFailure {
                        step_index: index,
                        command_id: command.id().to_string(),
                        message: format!("{err:#}"),
                    });
                    break;
                }
            }
        }

        outcome
    }

    async fn run_step(
        &self,
        command: &MacroCommand,
        variables: &mut Variables,
        depth: usize,
    ) -> Result<()> {
        match &command.kind {
            CommandKind::Choice { choice_id } => {
                let choice = self.executor.lookup(ChoiceLookup::Id(choice_id))?;
                self.executor.run_choice(&choice, variables, depth + 1).await
            }
            CommandKind::UserScript {
                program,
                args,
                output_variable,
            } => {
                let formatter = self.executor.formatter();
                let args = args
                    .iter()
                    .map(|arg| formatter.format(arg, variables))
                    .collect::<Result<Vec<_>>>()?;
                let stdout = script::run_script(program, &args, variables).await?;
                if let Some(name) = output_variable {
                    variables.insert(name.clone(), stdout);
                }
                Ok(())
            }
            CommandKind::AiAssistant(step) => {
                assistant::run_assistant(self.executor, step, variables).await
            }
            CommandKind::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                Ok(())
            }
        }
    }

    fn report(&self, index: usize, command: &MacroCommand, err: &anyhow::Error, notify: bool) {
        tracing::error!(
            step = index,
            command = command.id(),
            kind = command.kind.as_str(),
            error = %format!("{err:#}"),
            "macro step failed"
        );
        if !notify {
            return;
        }
        let notifier = &self.executor.host().notifier;
        let notice = notifier.show(&format!("Macro step {} failed: {err:#}", index + 1));
        notifier.dismiss_after(notice, self.executor.options().notice_dismiss);
    }
}
