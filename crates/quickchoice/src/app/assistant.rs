//! The AI-assistant macro step: prompt template selection, the provider request with progress
//! feedback, and the variables bound from the reply.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::app::executor::ChoiceExecutor;
use crate::app::macro_engine::AlreadyReported;
use crate::app::poll::PollUntilResolved;
use crate::domain::errors::ChoiceError;
use crate::domain::model::{AiAssistantCommand, Variables};
use crate::infra::ai::{AiClient, AiRequest};
use crate::infra::notice::Notifier;
use crate::infra::picker::{PickOption, Picker};
use crate::infra::vault::{DocumentStore, FileRef};

/// Variable holding the reply as a markdown blockquote.
pub const QUOTED_VARIABLE: &str = "quoted";

const PROMPT_EXTENSION: &str = "md";

/// Prefix every line of `text` with `> `.
pub fn blockquote(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The two variables bound by a successful assistant step.
pub fn output_variables(output_variable: &str, content: &str) -> Variables {
    let mut variables = Variables::new();
    variables.insert(QUOTED_VARIABLE.to_string(), blockquote(content));
    variables.insert(output_variable.to_string(), content.to_string());
    variables
}

/// Pick the prompt template: by stem or file name when `wanted` is set, otherwise via `picker`.
pub async fn resolve_prompt_template(
    documents: &dyn DocumentStore,
    picker: &dyn Picker,
    folder: &str,
    wanted: Option<&str>,
) -> Result<FileRef> {
    let candidates: Vec<FileRef> = documents
        .files_under_folder(folder)
        .await?
        .into_iter()
        .filter(|file| file.extension() == Some(PROMPT_EXTENSION))
        .collect();
    if candidates.is_empty() {
        return Err(ChoiceError::not_found("prompt templates", folder).into());
    }

    if let Some(wanted) = wanted {
        return candidates
            .into_iter()
            .find(|file| file.stem() == wanted || file.file_name() == wanted)
            .ok_or_else(|| ChoiceError::not_found("prompt template", wanted).into());
    }

    let options: Vec<PickOption> = candidates
        .iter()
        .map(|file| PickOption::new(file.stem(), file.as_str()))
        .collect();
    match picker.suggest(&options).await {
        Some(picked) => Ok(FileRef::new(picked)),
        None => Err(ChoiceError::invalid("no prompt template selected").into()),
    }
}

/// Progress and failure feedback settings for one provider request.
#[derive(Debug, Clone, Copy)]
pub struct Feedback {
    pub progress_interval_ms: u64,
    pub notice_dismiss: Duration,
}

/// Send `request` while a notice shows the elapsed wait; returns the reply text. A failure is
/// shown on that notice and comes back wrapped so the macro engine does not show it again.
pub async fn request_with_progress(
    ai: &dyn AiClient,
    notifier: &dyn Notifier,
    feedback: Feedback,
    request: AiRequest,
) -> Result<String> {
    let model = request.model.clone();
    let notice = notifier.show(&format!("Waiting for {model}"));

    let result = PollUntilResolved::new(feedback.progress_interval_ms)
        .on_tick(|elapsed| {
            notifier.update(notice, &format!("Waiting for {model} ({}s)", elapsed.as_secs()));
        })
        .run(ai.request(request))
        .await?;

    match result {
        Ok(response) => {
            notifier.update(notice, &format!("{model} finished"));
            notifier.dismiss_after(notice, feedback.notice_dismiss);
            Ok(response.content)
        }
        Err(err) => {
            notifier.update(notice, &format!("Assistant failed: {err}"));
            notifier.dismiss_after(notice, feedback.notice_dismiss);
            Err(AlreadyReported::wrap(err))
        }
    }
}

/// Run one assistant step and bind its reply into `variables`.
pub(crate) async fn run_assistant(
    executor: &ChoiceExecutor,
    step: &AiAssistantCommand,
    variables: &mut Variables,
) -> Result<()> {
    let host = executor.host();
    let options = executor.options();
    let settings = executor.settings().read(|settings| settings.ai.clone());

    let template = resolve_prompt_template(
        host.documents.as_ref(),
        host.picker.as_ref(),
        &settings.prompt_templates_folder,
        step.prompt_template.as_deref(),
    )
    .await?;
    let source = host
        .documents
        .read_file(&template)
        .await
        .with_context(|| format!("failed to read prompt template {template}"))?;

    let formatter = executor.formatter();
    let user_prompt = formatter.format(&source, variables)?;
    let system_prompt = formatter.format(
        step.system_prompt
            .as_deref()
            .unwrap_or(&settings.default_system_prompt),
        variables,
    )?;
    let model = step
        .model
        .clone()
        .or_else(|| options.model_override.clone())
        .unwrap_or(settings.default_model);
    tracing::info!(template = %template, model = %model, "asking assistant");

    let request = AiRequest {
        api_key: options.api_key.clone(),
        model,
        system_prompt,
        user_prompt,
    };
    let feedback = Feedback {
        progress_interval_ms: options.progress_interval_ms,
        notice_dismiss: options.notice_dismiss,
    };
    let content =
        request_with_progress(host.ai.as_ref(), host.notifier.as_ref(), feedback, request).await?;

    variables.extend(output_variables(&step.output_variable, &content));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::infra::ai::AiResponse;
    use crate::infra::notice::{NoticeEvent, RecordingNotifier};
    use crate::infra::picker::ScriptedPicker;
    use crate::infra::vault::MemoryVault;

    struct SlowAi {
        delay: Duration,
        reply: Result<String, String>,
    }

    #[async_trait]
    impl AiClient for SlowAi {
        async fn request(&self, _request: AiRequest) -> Result<AiResponse> {
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(AiResponse {
                    content: content.clone(),
                }),
                Err(message) => Err(ChoiceError::ExternalRequest(message.clone()).into()),
            }
        }
    }

    fn request() -> AiRequest {
        AiRequest {
            api_key: "key".into(),
            model: "gpt-test".into(),
            system_prompt: "sys".into(),
            user_prompt: "hi".into(),
        }
    }

    const FEEDBACK: Feedback = Feedback {
        progress_interval_ms: 1_000,
        notice_dismiss: Duration::from_secs(10),
    };

    #[test]
    fn output_variables_are_content_and_quote() {
        let variables = output_variables("summary", "line one\nline two");
        assert_eq!(variables.len(), 2);
        assert_eq!(variables["summary"], "line one\nline two");
        assert_eq!(variables[QUOTED_VARIABLE], "> line one\n> line two");
    }

    #[test]
    fn blockquote_keeps_empty_and_trailing_lines() {
        assert_eq!(blockquote(""), "> ");
        assert_eq!(blockquote("done\n"), "> done\n> ");
        assert_eq!(blockquote("a\n\nb"), "> a\n> \n> b");
    }

    #[tokio::test]
    async fn template_is_selected_by_name_or_picker() -> Result<()> {
        let vault = MemoryVault::with_files([
            ("prompts/summary.md", "Summarize {{ value }}"),
            ("prompts/translate.md", "Translate"),
            ("prompts/notes.txt", "ignored"),
            ("other/summary.md", "elsewhere"),
        ]);
        let picker = ScriptedPicker::new(["translate"]);

        let by_stem = resolve_prompt_template(&vault, &picker, "prompts", Some("summary")).await?;
        assert_eq!(by_stem.as_str(), "prompts/summary.md");
        let by_name =
            resolve_prompt_template(&vault, &picker, "prompts", Some("translate.md")).await?;
        assert_eq!(by_name.as_str(), "prompts/translate.md");

        let picked = resolve_prompt_template(&vault, &picker, "prompts", None).await?;
        assert_eq!(picked.as_str(), "prompts/translate.md");
        Ok(())
    }

    #[tokio::test]
    async fn missing_templates_are_not_found() {
        let vault = MemoryVault::with_files([("prompts/summary.md", "x")]);
        let picker = ScriptedPicker::new(Vec::<String>::new());

        let err = resolve_prompt_template(&vault, &picker, "empty", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChoiceError>(),
            Some(&ChoiceError::not_found("prompt templates", "empty"))
        );

        let err = resolve_prompt_template(&vault, &picker, "prompts", Some("nope"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChoiceError>(),
            Some(&ChoiceError::not_found("prompt template", "nope"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn progress_notice_counts_seconds() -> Result<()> {
        let ai = SlowAi {
            delay: Duration::from_millis(2_500),
            reply: Ok("answer".into()),
        };
        let notifier = RecordingNotifier::new();

        let content = request_with_progress(&ai, &notifier, FEEDBACK, request()).await?;
        assert_eq!(content, "answer");

        let messages: Vec<String> = notifier
            .events()
            .into_iter()
            .filter_map(|event| match event {
                NoticeEvent::Shown { message, .. } | NoticeEvent::Updated { message, .. } => {
                    Some(message)
                }
                NoticeEvent::Dismissed { .. } => None,
            })
            .collect();
        assert_eq!(
            messages,
            [
                "Waiting for gpt-test",
                "Waiting for gpt-test (1s)",
                "Waiting for gpt-test (2s)",
                "gpt-test finished",
            ]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failures_update_notice_and_schedule_dismissal() {
        let ai = SlowAi {
            delay: Duration::from_millis(10),
            reply: Err("401 Unauthorized: bad key".into()),
        };
        let notifier = RecordingNotifier::new();

        let err = request_with_progress(&ai, &notifier, FEEDBACK, request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad key"));
        assert!(err.is::<AlreadyReported>());

        let events = notifier.events();
        assert_eq!(
            events.last(),
            Some(&NoticeEvent::Dismissed {
                id: 0,
                delay: Duration::from_secs(10)
            })
        );
        let last = notifier.last_message(0).unwrap_or_default();
        assert!(last.starts_with("Assistant failed: "), "{last}");
        assert!(last.contains("401 Unauthorized: bad key"));
    }
}
