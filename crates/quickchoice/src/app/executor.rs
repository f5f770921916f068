//! Runs a choice: creates documents from templates, captures into existing ones,
//! descends into multi choices, and hands macros to the [`MacroEngine`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::app::capture::{self, Placement};
use crate::app::formatter::Formatter;
use crate::app::macro_engine::{MacroAborted, MacroEngine};
use crate::app::registrar::Launcher;
use crate::app::store::SettingsStore;
use crate::app::template::{self, WriteMode};
use crate::domain::errors::ChoiceError;
use crate::domain::model::{CaptureChoice, Choice, ChoiceKind, MultiChoice, TemplateChoice, Variables};
use crate::domain::tree::{self, ChoiceLookup};
use crate::infra::ai::AiClient;
use crate::infra::config::Config;
use crate::infra::notice::Notifier;
use crate::infra::picker::{PickOption, Picker};
use crate::infra::vault::{DocumentStore, FileRef};

/// Deepest chain of choices one invocation may run through (multi descents and macro calls).
pub const MAX_DEPTH: usize = 32;

/// Variable holding the captured text.
pub const VALUE_VARIABLE: &str = "value";
/// Path of the document created by a template choice.
pub const TEMPLATE_PATH_VARIABLE: &str = "template_path";
/// File stem of the document created by a template choice.
pub const TITLE_VARIABLE: &str = "title";
/// Path of the document written by a capture choice.
pub const CAPTURE_PATH_VARIABLE: &str = "capture_path";

/// Host services the executor drives.
#[derive(Clone)]
pub struct Host {
    pub documents: Arc<dyn DocumentStore>,
    pub picker: Arc<dyn Picker>,
    pub ai: Arc<dyn AiClient>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    pub api_key: String,
    /// Model used when a step does not name one; beats the settings default.
    pub model_override: Option<String>,
    pub progress_interval_ms: u64,
    pub notice_dismiss: Duration,
}

impl ExecutorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.ai.api_key(),
            model_override: config.ai.model.clone(),
            progress_interval_ms: config.ai.progress_interval_ms,
            notice_dismiss: config.ai.notice_dismiss_delay(),
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_override: None,
            progress_interval_ms: 1_000,
            notice_dismiss: Duration::from_secs(10),
        }
    }
}

pub struct ChoiceExecutor {
    settings: Arc<SettingsStore>,
    host: Host,
    formatter: Formatter,
    options: ExecutorOptions,
}

impl ChoiceExecutor {
    pub fn new(settings: Arc<SettingsStore>, host: Host, options: ExecutorOptions) -> Self {
        Self {
            settings,
            host,
            formatter: Formatter::new(),
            options,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Run `choice` with no variables bound yet.
    pub async fn execute(&self, choice: &Choice) -> Result<()> {
        let mut variables = Variables::new();
        self.execute_with(choice, &mut variables).await
    }

    /// Run `choice` with `variables` pre-bound; later bindings are written back into it.
    ///
    /// Macro step failures are reported by the macro engine and do not surface here.
    pub async fn execute_with(&self, choice: &Choice, variables: &mut Variables) -> Result<()> {
        tracing::info!(choice = choice.id(), kind = %choice.kind(), name = %choice.name, "running choice");
        match self.run_choice(choice, variables, 0).await {
            Err(err) if err.is::<MacroAborted>() => {
                tracing::debug!(error = %err, "macro stopped early");
                Ok(())
            }
            other => other,
        }
    }

    /// Look the choice up in the current settings and run it.
    pub async fn execute_by(&self, lookup: ChoiceLookup<'_>) -> Result<()> {
        let choice = self.lookup(lookup)?;
        self.execute(&choice).await
    }

    /// Callback for the command registrar: runs the choice by id and reports any failure.
    ///
    /// The launcher holds the executor weakly; once the executor is gone it does nothing.
    pub fn launcher(self: &Arc<Self>) -> Launcher {
        let executor = Arc::downgrade(self);
        Arc::new(move |id| {
            let executor = executor.upgrade();
            async move {
                let Some(executor) = executor else {
                    tracing::debug!(choice = %id, "executor dropped; command ignored");
                    return;
                };
                if let Err(err) = executor.execute_by(ChoiceLookup::Id(&id)).await {
                    executor.report_failure(&id, &err);
                }
            }
            .boxed()
        })
    }

    /// Clone of the choice matching `lookup` in the current settings.
    pub(crate) fn lookup(&self, lookup: ChoiceLookup<'_>) -> Result<Choice> {
        let choice = self
            .settings
            .read(|settings| tree::find_choice(&settings.choices, lookup).cloned())?;
        Ok(choice)
    }

    pub(crate) fn run_choice<'a>(
        &'a self,
        choice: &'a Choice,
        variables: &'a mut Variables,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if depth >= MAX_DEPTH {
                return Err(ChoiceError::invalid(format!(
                    "choice '{}' nests deeper than {MAX_DEPTH} levels",
                    choice.name
                ))
                .into());
            }

            match choice.kind() {
                ChoiceKind::Multi(multi) => self.run_multi(multi, variables, depth).await,
                ChoiceKind::Template(template) => self.run_template(template, variables).await,
                ChoiceKind::Capture(capture) => {
                    self.run_capture(&choice.name, capture, variables).await
                }
                ChoiceKind::Macro(macro_choice) => {
                    let outcome = MacroEngine::new(self)
                        .run(&macro_choice.commands, variables, depth)
                        .await;
                    match outcome.failure {
                        Some(failure) => Err(MacroAborted::new(&choice.name, failure).into()),
                        None => Ok(()),
                    }
                }
            }
        }
        .boxed()
    }

    async fn run_multi(
        &self,
        multi: &MultiChoice,
        variables: &mut Variables,
        depth: usize,
    ) -> Result<()> {
        let options: Vec<PickOption> = multi
            .children
            .iter()
            .map(|child| PickOption::new(&child.name, child.id()))
            .collect();
        let Some(picked) = self.host.picker.suggest(&options).await else {
            tracing::debug!("choice selection cancelled");
            return Ok(());
        };
        let child = multi
            .children
            .iter()
            .find(|child| child.id() == picked)
            .ok_or_else(|| ChoiceError::not_found("choice", picked.as_str()))?;
        self.run_choice(child, variables, depth + 1).await
    }

    async fn run_template(&self, template: &TemplateChoice, variables: &mut Variables) -> Result<()> {
        let documents = self.host.documents.as_ref();
        let source_file = FileRef::new(self.formatter.format(&template.template_path, variables)?);
        let source = documents
            .read_file(&source_file)
            .await
            .with_context(|| format!("failed to read template {source_file}"))?;

        let file_name = self.formatter.format(&template.file_name_format, variables)?;
        let folder = template
            .folder
            .as_deref()
            .map(|folder| self.formatter.format(folder, variables))
            .transpose()?;
        let target = template::target_file(folder.as_deref(), &file_name)?;
        let (target, mode) = template::plan_write(documents, target, template.on_exists).await?;

        variables.insert(TITLE_VARIABLE.to_string(), target.stem().to_string());
        let rendered = self.formatter.format(&source, variables)?;
        let content = match mode {
            WriteMode::Append => {
                let existing = documents.read_file(&target).await?;
                capture::insert_capture(&existing, &rendered, Placement::Bottom)?
            }
            WriteMode::Create | WriteMode::Overwrite => rendered,
        };

        documents.write_file(&target, &content).await?;
        tracing::info!(file = %target, template = %source_file, ?mode, "wrote document from template");
        variables.insert(TEMPLATE_PATH_VARIABLE.to_string(), target.to_string());
        Ok(())
    }

    async fn run_capture(
        &self,
        name: &str,
        capture: &CaptureChoice,
        variables: &mut Variables,
    ) -> Result<()> {
        if !variables.contains_key(VALUE_VARIABLE) {
            let Some(value) = self.host.picker.prompt(name).await else {
                tracing::debug!(choice = name, "capture cancelled");
                return Ok(());
            };
            variables.insert(VALUE_VARIABLE.to_string(), value);
        }

        let documents = self.host.documents.as_ref();
        let target = FileRef::new(self.formatter.format(&capture.capture_to, variables)?);
        let target = match target.extension() {
            Some(_) => target,
            None => FileRef::new(format!("{target}.md")),
        };
        let captured = self.formatter.format(&capture.format, variables)?;

        let existing = if documents.exists(&target).await? {
            documents.read_file(&target).await?
        } else if capture.create_file_if_missing {
            tracing::debug!(file = %target, "creating capture target");
            String::new()
        } else {
            return Err(ChoiceError::not_found("file", target.as_str()).into());
        };

        let heading = capture
            .insert_after
            .as_ref()
            .map(|insert| self.formatter.format(&insert.heading, variables))
            .transpose()?;
        let placement = match (&capture.insert_after, heading.as_deref()) {
            (Some(options), Some(heading)) => Placement::AfterHeading { heading, options },
            _ if capture.prepend => Placement::Top,
            _ => Placement::Bottom,
        };

        let updated = capture::insert_capture(&existing, &captured, placement)?;
        documents.write_file(&target, &updated).await?;
        tracing::info!(file = %target, "captured into document");
        variables.insert(CAPTURE_PATH_VARIABLE.to_string(), target.to_string());
        Ok(())
    }

    fn report_failure(&self, id: &str, err: &anyhow::Error) {
        tracing::error!(choice = id, error = %format!("{err:#}"), "choice failed");
        let notice = self.host.notifier.show(&format!("Choice failed: {err:#}"));
        self.host.notifier.dismiss_after(notice, self.options.notice_dismiss);
    }
}
