//! Single-writer settings store with change subscribers.
//!
//! Every mutation goes through [`SettingsStore::set_state`] or
//! [`SettingsStore::update`]; subscribers (persistence, command registration)
//! receive a snapshot of the new state after the write lock is released.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use parking_lot::{Mutex, RwLock};

use crate::domain::errors::ChoiceError;
use crate::domain::model::{Choice, Settings};
use crate::domain::tree;
use crate::infra::settings_file::SettingsFile;

type Listener = Arc<dyn Fn(&Settings) + Send + Sync>;

/// Handle returned by [`SettingsStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub struct SettingsStore {
    state: RwLock<Settings>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            state: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current settings.
    pub fn get_state(&self) -> Settings {
        self.state.read().clone()
    }

    /// Borrow the current settings without cloning them.
    pub fn read<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        f(&self.state.read())
    }

    /// Apply `mutate` and notify subscribers. Rejected, leaving the settings untouched, when the
    /// result would repeat a choice id.
    pub fn set_state(&self, mutate: impl FnOnce(&mut Settings)) -> Result<()> {
        self.update(|settings| {
            mutate(settings);
            Ok(())
        })
    }

    /// Apply a fallible mutation. Subscribers only hear about it when it succeeds; on error the
    /// settings are left exactly as they were. Every committed state has unique choice ids.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut Settings) -> Result<R>) -> Result<R> {
        let (result, snapshot) = {
            let mut state = self.state.write();
            let mut draft = state.clone();
            let result = mutate(&mut draft)?;
            tree::validate_unique_ids(&draft.choices)?;
            *state = draft;
            (result, state.clone())
        };
        self.notify(&snapshot);
        Ok(result)
    }

    pub fn subscribe(&self, listener: impl Fn(&Settings) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Persist every future state change to `file`. Write failures are logged, not raised.
    pub fn persist_to(&self, file: SettingsFile) -> SubscriptionId {
        self.subscribe(move |settings| {
            if let Err(err) = file.save(settings) {
                tracing::error!(error = %err, path = %file.path().display(), "failed to persist settings");
            }
        })
    }

    /// Add a choice at the root or under a `Multi` container.
    pub fn add_choice(&self, parent: Option<&str>, choice: Choice) -> Result<()> {
        self.update(|settings| {
            tree::insert_choice(&mut settings.choices, parent, choice)?;
            Ok(())
        })
    }

    /// Delete a choice (and its subtree) wherever it sits in the tree.
    pub fn delete_choice(&self, id: &str) -> Result<Choice> {
        self.update(|settings| Ok(tree::remove_choice(&mut settings.choices, id)?))
    }

    /// Rename a choice or toggle its command flag; the variant itself cannot change.
    pub fn edit_choice(&self, id: &str, edit: impl FnOnce(&mut Choice)) -> Result<()> {
        self.update(|settings| {
            let choice = tree::find_choice_mut(&mut settings.choices, tree::ChoiceLookup::Id(id))?;
            let id_before = choice.id().to_string();
            let kind_before = std::mem::discriminant(choice.kind());
            edit(choice);
            if choice.id() != id_before {
                return Err(ChoiceError::invalid("choice ids are immutable").into());
            }
            if std::mem::discriminant(choice.kind()) != kind_before {
                return Err(ChoiceError::invalid("choice types are immutable").into());
            }
            Ok(())
        })
    }

    fn notify(&self, snapshot: &Settings) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
