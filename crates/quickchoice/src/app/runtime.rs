//! Wiring of settings, host adapters, executor, and command registration.

use std::sync::Arc;

use anyhow::Result;

use crate::app::executor::{ChoiceExecutor, ExecutorOptions, Host};
use crate::app::registrar::CommandRegistrar;
use crate::app::store::{SettingsStore, SubscriptionId};
use crate::infra::ai::OpenAiClient;
use crate::infra::config::Config;
use crate::infra::notice::TracingNotifier;
use crate::infra::picker::Picker;
use crate::infra::registry::InMemoryRegistry;
use crate::infra::settings_file::SettingsFile;
use crate::infra::vault::FsVault;

/// A running instance: settings loaded, commands registered, executor ready.
pub struct QuickChoice {
    config: Config,
    store: Arc<SettingsStore>,
    registry: Arc<InMemoryRegistry>,
    executor: Arc<ChoiceExecutor>,
    registrar: Arc<CommandRegistrar>,
    registration: SubscriptionId,
}

impl QuickChoice {
    /// Load settings from disk and wire the filesystem vault, the OpenAI client, and `picker`.
    /// Settings changes are persisted back to the settings file.
    pub fn start(config: Config, picker: Arc<dyn Picker>) -> Result<Self> {
        let settings_file = SettingsFile::new(config.defaults.settings_path());
        let store = Arc::new(SettingsStore::new(settings_file.load()?));
        store.persist_to(settings_file);

        let host = Host {
            documents: Arc::new(FsVault::new(&config.defaults.vault)),
            picker,
            ai: Arc::new(OpenAiClient::new(&config.ai.endpoint)),
            notifier: Arc::new(TracingNotifier::new()),
        };
        Ok(Self::with_host(config, store, host))
    }

    /// Wire an instance around caller-supplied host adapters.
    pub fn with_host(config: Config, store: Arc<SettingsStore>, host: Host) -> Self {
        let executor = Arc::new(ChoiceExecutor::new(
            Arc::clone(&store),
            host,
            ExecutorOptions::from_config(&config),
        ));
        let registry = Arc::new(InMemoryRegistry::new());
        let registrar = Arc::new(CommandRegistrar::new(registry.clone(), executor.launcher()));
        let registration = registrar.attach(&store);
        tracing::debug!(commands = registrar.registered().len(), "quickchoice ready");

        Self {
            config,
            store,
            registry,
            executor,
            registrar,
            registration,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    pub fn registry(&self) -> &InMemoryRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<ChoiceExecutor> {
        &self.executor
    }

    pub fn registrar(&self) -> &CommandRegistrar {
        &self.registrar
    }
}

impl Drop for QuickChoice {
    fn drop(&mut self) {
        self.store.unsubscribe(self.registration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::{CaptureChoice, Choice, ChoiceKind, Settings};
    use crate::infra::notice::RecordingNotifier;
    use crate::infra::picker::ScriptedPicker;
    use crate::infra::vault::MemoryVault;

    struct NoAi;

    #[async_trait::async_trait]
    impl crate::infra::ai::AiClient for NoAi {
        async fn request(
            &self,
            _request: crate::infra::ai::AiRequest,
        ) -> Result<crate::infra::ai::AiResponse> {
            anyhow::bail!("offline")
        }
    }

    #[tokio::test]
    async fn registered_commands_run_the_current_choice() -> Result<()> {
        let vault = Arc::new(MemoryVault::with_files([("log.md", "")]));
        let host = Host {
            documents: vault.clone(),
            picker: Arc::new(ScriptedPicker::new(["first", "second"])),
            ai: Arc::new(NoAi),
            notifier: Arc::new(RecordingNotifier::new()),
        };
        let store = Arc::new(SettingsStore::new(Settings::default()));
        let app = QuickChoice::with_host(Config::default(), store, host);
        assert!(app.registry().ids().is_empty());

        let log = Choice::with_id("log", "Log", ChoiceKind::Capture(CaptureChoice::new("log.md")))
            .with_command(true);
        app.store().add_choice(None, log)?;
        assert_eq!(app.registrar().registered(), ["log"]);

        app.registry().invoke("log").await?;
        app.store().edit_choice("log", |choice| {
            if let Some(capture) = choice.capture_mut() {
                capture.prepend = true;
            }
        })?;
        app.registry().invoke("log").await?;

        assert_eq!(vault.contents("log.md").as_deref(), Some("second\nfirst\n"));
        Ok(())
    }

    #[tokio::test]
    async fn dropping_the_instance_releases_the_executor() {
        let host = Host {
            documents: Arc::new(MemoryVault::with_files([("log.md", "")])),
            picker: Arc::new(ScriptedPicker::new(Vec::<String>::new())),
            ai: Arc::new(NoAi),
            notifier: Arc::new(RecordingNotifier::new()),
        };
        let store = Arc::new(SettingsStore::new(Settings::default()));
        let app = QuickChoice::with_host(Config::default(), Arc::clone(&store), host);
        let executor = Arc::downgrade(app.executor());
        let registrar = Arc::downgrade(&app.registrar);

        drop(app);

        assert!(executor.upgrade().is_none());
        assert!(registrar.upgrade().is_none());
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
