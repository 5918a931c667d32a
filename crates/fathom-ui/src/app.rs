//! Static facts about the app under test.
//!
//! Produced by an external package analyser; the engine only consumes it to
//! seed the first launch and to tell in-app screens from foreign ones.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::snapshot::RawUiTree;

pub type ComponentId = String;
pub type Permission = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub package: String,
    pub main_entry: ComponentId,
    #[serde(default)]
    pub components: BTreeSet<ComponentId>,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

/// Where the app under test sits relative to the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Foreground {
    /// The foreground component belongs to the app.
    InApp,
    /// The app is still on the activity stack, `depth` entries below the top.
    Backgrounded { depth: u32 },
    /// The app is not on the activity stack at all.
    NotRunning,
}

impl AppDescriptor {
    pub fn new(package: &str, main_entry: &str) -> Self {
        let mut components = BTreeSet::new();
        components.insert(main_entry.to_string());
        Self {
            package: package.to_string(),
            main_entry: main_entry.to_string(),
            components,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.components.insert(component.to_string());
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.insert(permission.to_string());
        self
    }

    pub fn components(&self) -> &BTreeSet<ComponentId> {
        &self.components
    }

    pub fn main_entry(&self) -> &ComponentId {
        &self.main_entry
    }

    pub fn permissions_declared(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Whether a component name belongs to this app. Declared components are
    /// matched exactly, anything else by package prefix.
    pub fn owns(&self, component: &str) -> bool {
        self.components.contains(component)
            || component
                .strip_prefix(self.package.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('/'))
    }

    /// Classify a snapshot: is the app in front, buried, or gone?
    pub fn classify(&self, tree: &RawUiTree) -> Foreground {
        let in_front = match (&tree.foreground_package, &tree.foreground_activity) {
            (Some(pkg), _) if pkg == &self.package => true,
            (_, Some(activity)) => self.owns(activity),
            _ => false,
        };
        if in_front {
            return Foreground::InApp;
        }
        match tree.activity_stack.iter().position(|a| self.owns(a)) {
            Some(0) => Foreground::InApp,
            Some(depth) => Foreground::Backgrounded {
                depth: depth as u32,
            },
            None => Foreground::NotRunning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppDescriptor {
        AppDescriptor::new("com.example.notes", "com.example.notes.MainActivity")
            .with_component("com.example.notes.EditActivity")
    }

    #[test]
    fn test_owns_declared_and_prefixed_components() {
        let app = app();
        assert!(app.owns("com.example.notes.EditActivity"));
        assert!(app.owns("com.example.notes.SettingsActivity"));
        assert!(!app.owns("com.example.notesextra.Main"));
        assert!(!app.owns("com.android.launcher3.Launcher"));
    }

    #[test]
    fn test_classify_foreground() {
        let app = app();
        let tree = RawUiTree {
            foreground_activity: Some("com.example.notes.MainActivity".into()),
            ..Default::default()
        };
        assert_eq!(app.classify(&tree), Foreground::InApp);
    }

    #[test]
    fn test_classify_backgrounded_uses_stack_depth() {
        let app = app();
        let tree = RawUiTree {
            foreground_activity: Some("com.android.chrome.Main".into()),
            foreground_package: Some("com.android.chrome".into()),
            activity_stack: vec![
                "com.android.chrome.Main".into(),
                "com.example.notes.EditActivity".into(),
            ],
            ..Default::default()
        };
        assert_eq!(app.classify(&tree), Foreground::Backgrounded { depth: 1 });
    }

    #[test]
    fn test_classify_not_running() {
        let app = app();
        let tree = RawUiTree {
            foreground_activity: Some("com.android.launcher3.Launcher".into()),
            activity_stack: vec!["com.android.launcher3.Launcher".into()],
            ..Default::default()
        };
        assert_eq!(app.classify(&tree), Foreground::NotRunning);
    }
}
