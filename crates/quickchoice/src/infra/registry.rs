//! Host command registry: named, invokable entries keyed by choice id.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::domain::errors::ChoiceError;

/// Callback run when a registered command is invoked.
pub type CommandCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// External registry of invokable commands. Stale entries are never collected automatically.
pub trait CommandRegistry: Send + Sync {
    /// Register `id`, replacing any previous entry with the same id.
    fn register(&self, id: &str, display_name: &str, on_invoke: CommandCallback);

    fn unregister(&self, id: &str);
}

#[derive(Clone)]
struct RegisteredCommand {
    display_name: String,
    on_invoke: CommandCallback,
}

/// Registry kept in process memory; the CLI lists and invokes from it.
#[derive(Default)]
pub struct InMemoryRegistry {
    commands: Mutex<BTreeMap<String, RegisteredCommand>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.commands.lock().keys().cloned().collect()
    }

    /// `(id, display name)` pairs in id order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.commands
            .lock()
            .iter()
            .map(|(id, command)| (id.clone(), command.display_name.clone()))
            .collect()
    }

    pub fn display_name(&self, id: &str) -> Option<String> {
        self.commands
            .lock()
            .get(id)
            .map(|command| command.display_name.clone())
    }

    /// Run the callback registered under `id`.
    pub async fn invoke(&self, id: &str) -> Result<(), ChoiceError> {
        let callback = self
            .commands
            .lock()
            .get(id)
            .map(|command| command.on_invoke.clone())
            .ok_or_else(|| ChoiceError::not_found("command", id))?;
        callback().await;
        Ok(())
    }
}

impl CommandRegistry for InMemoryRegistry {
    fn register(&self, id: &str, display_name: &str, on_invoke: CommandCallback) {
        let replaced = self.commands.lock().insert(
            id.to_string(),
            RegisteredCommand {
                display_name: display_name.to_string(),
                on_invoke,
            },
        );
        tracing::debug!(id, display_name, replaced = replaced.is_some(), "registered command");
    }

    fn unregister(&self, id: &str) {
        if self.commands.lock().remove(id).is_some() {
            tracing::debug!(id, "unregistered command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    fn counting_callback(counter: Arc<AtomicUsize>) -> CommandCallback {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn register_replaces_existing_entry() {
        let registry = InMemoryRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry.register("a", "First", counting_callback(first.clone()));
        registry.register("a", "Second", counting_callback(second.clone()));
        assert_eq!(registry.ids(), ["a"]);
        assert_eq!(registry.display_name("a").as_deref(), Some("Second"));

        registry.invoke("a").await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invoking_unknown_id_fails() {
        let registry = InMemoryRegistry::new();
        registry.register("a", "A", counting_callback(Arc::default()));
        registry.unregister("a");
        let err = registry.invoke("a").await.unwrap_err();
        assert_eq!(err, ChoiceError::not_found("command", "a"));
    }
}
