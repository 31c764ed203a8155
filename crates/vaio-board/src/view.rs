//! Rendered grid output.

use serde::Serialize;
use vaio_proto::{ModuleType, Position, Size};
use vaio_registry::ComponentView;

use crate::error::ErrorCategory;

/// Recovery offered by an error panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelAction {
    /// Load the component again.
    Retry,
    /// Reload the whole board.
    Reload,
}

/// Stand-in for a pane that could not render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPanel {
    /// Error taxonomy bucket.
    pub category: ErrorCategory,
    /// What went wrong.
    pub message: String,
    /// Offered recoveries.
    pub actions: Vec<PanelAction>,
}

impl ErrorPanel {
    /// A UI error offering retry and reload.
    #[must_use]
    pub fn ui(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Ui,
            message: message.into(),
            actions: vec![PanelAction::Retry, PanelAction::Reload],
        }
    }
}

/// Content of a pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PaneBody {
    /// The component rendered.
    Component(ComponentView),
    /// The component could not be loaded or panicked.
    Error(ErrorPanel),
}

impl PaneBody {
    /// Whether this is an error panel.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One rendered pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaneView {
    /// Pane id.
    pub pane_id: String,
    /// Module category.
    pub module_type: ModuleType,
    /// Grid position in the widest breakpoint, when laid out.
    pub position: Option<Position>,
    /// Grid size in the widest breakpoint, when laid out.
    pub size: Option<Size>,
    /// What to draw.
    pub body: PaneBody,
}
