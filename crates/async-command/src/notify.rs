/*
[INPUT]:  State changes from commands and view models, listener registrations
[OUTPUT]: Change events delivered to subscribers through the Dispatcher
[POS]:    Notification fan-out - explicit observer registry, dispatcher-routed delivery
[UPDATE]: When adding observable properties or changing delivery rules
*/

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;

/// Names of the observable properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Title,
    IsBusy,
    Progress,
    LoadingText,
}

/// A property change together with the value it changed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyChange {
    Title(String),
    IsBusy(bool),
    Progress(u8),
    LoadingText(String),
}

impl PropertyChange {
    pub fn property(&self) -> Property {
        match self {
            PropertyChange::Title(_) => Property::Title,
            PropertyChange::IsBusy(_) => Property::IsBusy,
            PropertyChange::Progress(_) => Property::Progress,
            PropertyChange::LoadingText(_) => Property::LoadingText,
        }
    }
}

/// Events emitted to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// A property changed value
    PropertyChanged(PropertyChange),
    /// Eligibility may have changed; re-query `can_execute`
    CanExecuteChanged,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Listener = Arc<dyn Fn(&CommandEvent) + Send + Sync>;

/// Subscriber list shared between an observable object and in-flight deliveries.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ObserverRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        // Listeners run outside the lock, so poisoning only means a panic
        // while pushing or removing; the list itself stays valid.
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.lock().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn deliver(&self, event: &CommandEvent) {
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

/// Routes events for one observable object through its dispatcher.
#[derive(Clone)]
pub(crate) struct Notifier {
    registry: Arc<ObserverRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Notifier {
    pub(crate) fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            registry: Arc::new(ObserverRegistry::default()),
            dispatcher,
        }
    }

    pub(crate) fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    pub(crate) fn property_changed(&self, change: PropertyChange) {
        self.emit(CommandEvent::PropertyChanged(change));
    }

    pub(crate) fn can_execute_changed(&self) {
        self.emit(CommandEvent::CanExecuteChanged);
    }

    /// Subscribers are resolved when the dispatcher runs the action, not
    /// when the event is raised.
    pub(crate) fn emit(&self, event: CommandEvent) {
        let registry = self.registry.clone();
        let accepted = self
            .dispatcher
            .dispatch(Box::new(move || registry.deliver(&event)));
        if !accepted {
            warn!("dispatcher rejected change notification");
        }
    }
}
