//! Keeps the host command registry in step with the choice tree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::app::store::{SettingsStore, SubscriptionId};
use crate::domain::model::{ChoiceId, Settings};
use crate::domain::tree;
use crate::infra::registry::{CommandCallback, CommandRegistry};

/// Prefix of every registered command's display name.
pub const COMMAND_PREFIX: &str = "quickchoice";

/// Starts the choice with the given id; supplied by the executor.
pub type Launcher = Arc<dyn Fn(ChoiceId) -> BoxFuture<'static, ()> + Send + Sync>;

/// Registers one command per choice marked `command`, at any depth of the tree.
pub struct CommandRegistrar {
    registry: Arc<dyn CommandRegistry>,
    launcher: Launcher,
    registered: Mutex<BTreeSet<ChoiceId>>,
}

impl CommandRegistrar {
    pub fn new(registry: Arc<dyn CommandRegistry>, launcher: Launcher) -> Self {
        Self {
            registry,
            launcher,
            registered: Mutex::new(BTreeSet::new()),
        }
    }

    /// Run a full synchronization pass against `settings`.
    ///
    /// Choices no longer present (or no longer marked) are unregistered; every marked choice is
    /// registered again, which replaces the previous entry for the same id.
    pub fn sync(&self, settings: &Settings) {
        let desired: BTreeMap<ChoiceId, String> = tree::walk(&settings.choices)
            .filter(|choice| choice.command)
            .map(|choice| (choice.id().to_string(), display_name(&choice.name)))
            .collect();

        let mut registered = self.registered.lock();
        for stale in registered.iter().filter(|id| !desired.contains_key(*id)) {
            self.registry.unregister(stale);
        }
        for (id, name) in &desired {
            self.registry.register(id, name, self.callback(id.clone()));
        }
        *registered = desired.into_keys().collect();
        tracing::debug!(commands = registered.len(), "synchronized choice commands");
    }

    /// Drop the registration for `id`, e.g. right after the choice was deleted.
    pub fn remove(&self, id: &str) {
        self.registered.lock().remove(id);
        self.registry.unregister(id);
    }

    /// Ids currently registered by this registrar.
    pub fn registered(&self) -> Vec<ChoiceId> {
        self.registered.lock().iter().cloned().collect()
    }

    /// Sync now and after every change to `store`.
    pub fn attach(self: &Arc<Self>, store: &SettingsStore) -> SubscriptionId {
        store.read(|settings| self.sync(settings));
        let registrar = Arc::clone(self);
        store.subscribe(move |settings| registrar.sync(settings))
    }

    fn callback(&self, id: ChoiceId) -> CommandCallback {
        let launcher = Arc::clone(&self.launcher);
        Arc::new(move || launcher(id.clone()))
    }
}

fn display_name(name: &str) -> String {
    format!("{COMMAND_PREFIX}: {name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::FutureExt;

    use crate::domain::model::{CaptureChoice, Choice, ChoiceKind, MultiChoice};
    use crate::infra::registry::InMemoryRegistry;

    fn capture(id: &str, command: bool) -> Choice {
        Choice::with_id(id, id.to_uppercase(), ChoiceKind::Capture(CaptureChoice::new("log.md")))
            .with_command(command)
    }

    fn settings() -> Settings {
        Settings {
            choices: vec![
                capture("a", true),
                Choice::with_id(
                    "group",
                    "Group",
                    ChoiceKind::Multi(MultiChoice {
                        children: vec![capture("b", false), capture("c", true)],
                        collapsed: true,
                    }),
                )
                .with_command(true),
            ],
            ..Settings::default()
        }
    }

    fn recording_launcher() -> (Launcher, Arc<Mutex<Vec<ChoiceId>>>) {
        let launched = Arc::new(Mutex::new(Vec::new()));
        let sink = launched.clone();
        let launcher: Launcher = Arc::new(move |id| {
            let sink = sink.clone();
            async move { sink.lock().push(id) }.boxed()
        });
        (launcher, launched)
    }

    #[tokio::test]
    async fn registers_marked_choices_at_any_depth() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (launcher, launched) = recording_launcher();
        let registrar = CommandRegistrar::new(registry.clone(), launcher);

        registrar.sync(&settings());
        assert_eq!(registry.ids(), ["a", "c", "group"]);
        assert_eq!(registry.display_name("c").as_deref(), Some("quickchoice: C"));

        registry.invoke("c").await.unwrap();
        assert_eq!(*launched.lock(), ["c"]);
    }

    #[test]
    fn resync_is_idempotent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (launcher, _) = recording_launcher();
        let registrar = CommandRegistrar::new(registry.clone(), launcher);

        registrar.sync(&settings());
        registrar.sync(&settings());
        assert_eq!(registry.ids().len(), 3);
        assert_eq!(registrar.registered(), ["a", "c", "group"]);
    }

    #[test]
    fn deleting_a_choice_drops_its_command() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (launcher, _) = recording_launcher();
        let registrar = Arc::new(CommandRegistrar::new(registry.clone(), launcher));
        let store = SettingsStore::new(settings());
        registrar.attach(&store);
        assert!(registry.ids().contains(&"c".to_string()));

        store.delete_choice("c").unwrap();
        assert_eq!(registry.ids(), ["a", "group"]);

        store.edit_choice("a", |choice| choice.command = false).unwrap();
        assert_eq!(registry.ids(), ["group"]);

        registrar.remove("group");
        assert!(registry.ids().is_empty());
    }
}
