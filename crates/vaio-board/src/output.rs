//! Output formatting for CLI commands.

use std::io::Write;

use serde::Serialize;
use vaio_proto::ModuleType;
use vaio_registry::{ModuleDefinition, RefreshOutcome};

use crate::cli::Format;
use crate::error::BoardError;
use crate::grid::BoardStatus;
use crate::view::{PaneBody, PaneView};

/// Writes values as tables or JSON.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Whether JSON is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write `value` in the selected format.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), BoardError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| BoardError::Output(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Human-readable rendering.
pub trait TableDisplay {
    /// Write the value as a table.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), BoardError>;
}

impl TableDisplay for BoardStatus {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), BoardError> {
        writeln!(writer, "Board Status")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Session source:   {}", self.source.unwrap_or("none"))?;
        writeln!(writer, "Socket:           {}", self.connection)?;
        writeln!(writer, "Known modules:    {}", self.known_modules)?;
        writeln!(writer, "Layout items:     {}", self.layout_items)?;
        writeln!(writer)?;
        writeln!(writer, "Active panes ({})", self.active_modules.len())?;
        for pane in &self.active_modules {
            match self.component_errors.get(pane) {
                Some(err) => writeln!(writer, "  {pane}  (error: {})", err.message)?,
                None => writeln!(writer, "  {pane}")?,
            }
        }
        if !self.metrics.is_empty() {
            let namespaces: Vec<&str> = self.metrics.iter().map(|ns| ns.as_str()).collect();
            writeln!(writer)?;
            writeln!(writer, "Metrics:          {}", namespaces.join(", "))?;
        }
        if let Some(err) = &self.last_error {
            writeln!(writer)?;
            writeln!(writer, "Last error:       {err}")?;
        }
        Ok(())
    }
}

/// One row of `modules` output.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRow {
    /// Category.
    pub module_type: ModuleType,
    /// Implementation name.
    pub static_identifier: String,
    /// Display name.
    pub name: String,
    /// Launcher grouping.
    pub category: Option<String>,
    /// Metrics namespace.
    pub socket_namespace: Option<String>,
    /// Whether a local component exists.
    pub loadable: bool,
}

impl From<&ModuleDefinition> for ModuleRow {
    fn from(def: &ModuleDefinition) -> Self {
        Self {
            module_type: def.module_type,
            static_identifier: def.static_identifier.clone(),
            name: def.metadata.name.clone(),
            category: def.metadata.category.clone(),
            socket_namespace: def.metadata.socket_namespace.clone(),
            loadable: def.loader.is_some(),
        }
    }
}

/// `modules` output.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ModuleList(pub Vec<ModuleRow>);

impl TableDisplay for ModuleList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), BoardError> {
        if self.0.is_empty() {
            writeln!(writer, "No modules found.")?;
            return Ok(());
        }
        writeln!(
            writer,
            "{:<8}  {:<20}  {:<16}  {:<12}  {:<9}  LOADABLE",
            "TYPE", "IDENTIFIER", "NAME", "CATEGORY", "NAMESPACE"
        )?;
        for row in &self.0 {
            writeln!(
                writer,
                "{:<8}  {:<20}  {:<16}  {:<12}  {:<9}  {}",
                row.module_type.as_str(),
                row.static_identifier,
                row.name,
                row.category.as_deref().unwrap_or("-"),
                row.socket_namespace.as_deref().unwrap_or("-"),
                if row.loadable { "yes" } else { "no" },
            )?;
        }
        Ok(())
    }
}

/// `render` output.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RenderedGrid(pub Vec<PaneView>);

impl TableDisplay for RenderedGrid {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), BoardError> {
        if self.0.is_empty() {
            writeln!(writer, "The board is empty.")?;
            return Ok(());
        }
        for view in &self.0 {
            let placement = match (view.position, view.size) {
                (Some(p), Some(s)) => format!("x={} y={} w={} h={}", p.x, p.y, s.w, s.h),
                _ => "unplaced".to_string(),
            };
            writeln!(writer, "{}  [{placement}]", view.pane_id)?;
            match &view.body {
                PaneBody::Component(component) => {
                    writeln!(writer, "  {}", component.title)?;
                    if !component.body.is_null() {
                        writeln!(writer, "  {}", component.body)?;
                    }
                }
                PaneBody::Error(panel) => {
                    writeln!(writer, "  {} error: {}", panel.category, panel.message)?;
                }
            }
        }
        Ok(())
    }
}

/// Result of a single pane or session action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// What was done.
    pub action: &'static str,
    /// Affected pane, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    /// Whether it fully succeeded.
    pub success: bool,
    /// Extra detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionResult {
    /// Successful action.
    #[must_use]
    pub const fn ok(action: &'static str) -> Self {
        Self {
            action,
            pane_id: None,
            success: true,
            detail: None,
        }
    }

    /// Attach a pane id.
    #[must_use]
    pub fn with_pane(mut self, pane_id: impl Into<String>) -> Self {
        self.pane_id = Some(pane_id.into());
        self
    }

    /// Attach detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Module database action result.
    #[must_use]
    pub fn from_refresh(action: &'static str, outcome: RefreshOutcome) -> Self {
        Self {
            action,
            pane_id: None,
            success: outcome.success,
            detail: Some(format!("{} modules known", outcome.total)),
        }
    }
}

impl TableDisplay for ActionResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), BoardError> {
        let status = if self.success { "ok" } else { "incomplete" };
        match &self.pane_id {
            Some(pane) => write!(writer, "{}: {pane} ({status})", self.action)?,
            None => write!(writer, "{}: {status}", self.action)?,
        }
        match &self.detail {
            Some(detail) => writeln!(writer, ", {detail}")?,
            None => writeln!(writer)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ErrorPanel;
    use vaio_proto::{Position, Size};

    fn grid() -> RenderedGrid {
        RenderedGrid(vec![PaneView {
            pane_id: "SERVICE-NvidiaPane-q1w2e".into(),
            module_type: ModuleType::Service,
            position: Some(Position { x: 0, y: 0 }),
            size: Some(Size { w: 6, h: 8 }),
            body: PaneBody::Error(ErrorPanel::ui("component load failed: offline")),
        }])
    }

    #[test]
    fn test_render_table() {
        let mut buf = Vec::new();
        OutputFormat::default().write(&mut buf, &grid()).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("SERVICE-NvidiaPane-q1w2e  [x=0 y=0 w=6 h=8]"));
        assert!(text.contains("UI error: component load failed: offline"));
    }

    #[test]
    fn test_render_json() {
        let mut buf = Vec::new();
        OutputFormat::new(Format::Json).write(&mut buf, &grid()).expect("write");
        let json: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(json[0]["body"]["kind"], "error");
        assert_eq!(json[0]["body"]["category"], "UI");
        assert_eq!(json[0]["body"]["actions"][0], "retry");
    }

    #[test]
    fn test_action_result_table() {
        let mut buf = Vec::new();
        let result = ActionResult::ok("launch").with_pane("SYSTEM-SupervisorPane-ab12c");
        OutputFormat::default().write(&mut buf, &result).expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "launch: SYSTEM-SupervisorPane-ab12c (ok)\n"
        );
    }
}
