//! Action registry and the finder that populates it.

use crate::{action::Action, error::RegistrationError};
use std::collections::HashMap;
use std::fmt;

/// Name-to-action lookup.
///
/// Populated once at start-up (usually from a [`Finder`]) and read-only
/// afterwards; share it behind an `Arc`.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: Vec<Action>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from everything `finder` discovers.
    pub fn from_finder(finder: &dyn Finder) -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        for action in finder.find()? {
            registry.register(action)?;
        }
        Ok(registry)
    }

    /// Register an action. Fails if the name is taken.
    pub fn register(&mut self, action: Action) -> Result<(), RegistrationError> {
        if self.index.contains_key(action.name()) {
            return Err(RegistrationError::DuplicateAction(action.name().to_string()));
        }
        tracing::debug!(
            action = action.name(),
            triggers = action.triggers().len(),
            "registered action"
        );
        self.index.insert(action.name().to_string(), self.actions.len());
        self.actions.push(action);
        Ok(())
    }

    /// Look up an action by name.
    pub fn by_name(&self, name: &str) -> Option<&Action> {
        self.index.get(name).map(|&i| &self.actions[i])
    }

    /// All actions in registration order.
    pub fn all(&self) -> &[Action] {
        &self.actions
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("count", &self.actions.len())
            .field("names", &self.actions.iter().map(Action::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Discovers the actions a process exposes.
pub trait Finder: Send + Sync {
    /// Every action to register.
    fn find(&self) -> Result<Vec<Action>, RegistrationError>;
}

/// A finder over an explicit list of actions.
#[derive(Default, Clone)]
pub struct StaticFinder {
    actions: Vec<Action>,
}

impl StaticFinder {
    /// An empty finder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action.
    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

impl FromIterator<Action> for StaticFinder {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl Finder for StaticFinder {
    fn find(&self) -> Result<Vec<Action>, RegistrationError> {
        Ok(self.actions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::Invocation, error::CallError};

    fn make_action(name: &str) -> Action {
        Action::builder(name, |_: Invocation| async { Ok::<_, CallError>(()) })
            .build()
            .unwrap()
    }

    #[test]
    fn empty_registry() {
        let reg = ActionRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.by_name("anything").is_none());
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ActionRegistry::new();
        reg.register(make_action("a")).unwrap();
        reg.register(make_action("b")).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.by_name("b").unwrap().name(), "b");
        let names: Vec<_> = reg.all().iter().map(Action::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut reg = ActionRegistry::new();
        reg.register(make_action("x")).unwrap();
        assert_eq!(
            reg.register(make_action("x")).unwrap_err(),
            RegistrationError::DuplicateAction("x".into())
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn finder_populates_registry() {
        let finder: StaticFinder = ["a", "b"].into_iter().map(make_action).collect();
        let reg = ActionRegistry::from_finder(&finder).unwrap();
        assert_eq!(reg.len(), 2);

        let dup = StaticFinder::new().with(make_action("a")).with(make_action("a"));
        assert!(ActionRegistry::from_finder(&dup).is_err());
    }
}
