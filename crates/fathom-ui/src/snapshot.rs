use serde::{Deserialize, Serialize};

/// One UI hierarchy dump as delivered by a device channel.
///
/// Everything here is "raw": pixel bounds, capture time and focus are kept so
/// the device side can address widgets, but the abstraction layer decides what
/// survives into a comparable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUiTree {
    /// Component (activity) currently in the foreground.
    #[serde(default)]
    pub foreground_activity: Option<String>,
    /// Package owning the foreground window.
    #[serde(default)]
    pub foreground_package: Option<String>,
    /// Activity back stack, top first.
    #[serde(default)]
    pub activity_stack: Vec<String>,
    /// Device time of the capture, in milliseconds.
    #[serde(default)]
    pub captured_at_ms: Option<u64>,
    #[serde(default)]
    pub root: Option<RawNode>,
}

impl RawUiTree {
    /// Total number of nodes in the hierarchy (unbounded walk).
    pub fn node_count(&self) -> usize {
        let Some(root) = &self.root else {
            return 0;
        };
        let mut count = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Pixel rectangle `[left, top] - [right, bottom]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

fn default_true() -> bool {
    true
}

/// A single view in the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_desc: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub children: Vec<RawNode>,
}

impl RawNode {
    /// A visible, enabled node of the given class with no flags set.
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            enabled: true,
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn clickable(mut self) -> Self {
        self.clickable = true;
        self
    }

    pub fn long_clickable(mut self) -> Self {
        self.long_clickable = true;
        self
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_child(mut self, child: RawNode) -> Self {
        self.children.push(child);
        self
    }
}
