//! Responsive grid layout types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::ids::{ModuleType, PaneId};

/// Default pane width in grid cells.
pub const DEFAULT_W: u32 = 12;
/// Default pane height in grid cells.
pub const DEFAULT_H: u32 = 8;
/// Default minimum width.
pub const DEFAULT_MIN_W: u32 = 3;
/// Default minimum height.
pub const DEFAULT_MIN_H: u32 = 3;

/// A named responsive layout tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    /// Large screens.
    Lg,
    /// Medium screens.
    Md,
    /// Small screens.
    Sm,
    /// Extra small screens.
    Xs,
    /// Smallest screens.
    Xxs,
}

impl Breakpoint {
    /// All breakpoints, widest first.
    pub const ALL: [Self; 5] = [Self::Lg, Self::Md, Self::Sm, Self::Xs, Self::Xxs];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lg => "lg",
            Self::Md => "md",
            Self::Sm => "sm",
            Self::Xs => "xs",
            Self::Xxs => "xxs",
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Breakpoint {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bp| bp.as_str() == s)
            .ok_or_else(|| ProtoError::Validation(format!("unknown breakpoint: {s}")))
    }
}

/// Grid cell coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

/// Cell spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Width in columns.
    pub w: u32,
    /// Height in rows.
    pub h: u32,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            w: DEFAULT_W,
            h: DEFAULT_H,
        }
    }
}

const fn default_min_w() -> u32 {
    DEFAULT_MIN_W
}

const fn default_min_h() -> u32 {
    DEFAULT_MIN_H
}

/// One pane's position and size at one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutItem {
    /// Pane id (wire string).
    pub i: String,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Width in columns.
    pub w: u32,
    /// Height in rows.
    pub h: u32,
    /// Minimum width.
    #[serde(default = "default_min_w")]
    pub min_w: u32,
    /// Minimum height.
    #[serde(default = "default_min_h")]
    pub min_h: u32,
    /// Module category of the pane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    /// Instance token of the pane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Whether the item is pinned in place.
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
}

impl LayoutItem {
    /// Create an item with default minimums.
    #[must_use]
    pub fn new(i: impl Into<String>, position: Position, size: Size) -> Self {
        Self {
            i: i.into(),
            x: position.x,
            y: position.y,
            w: size.w,
            h: size.h,
            min_w: DEFAULT_MIN_W,
            min_h: DEFAULT_MIN_H,
            module_type: None,
            instance_id: None,
            is_static: None,
        }
    }

    /// Create an item for a pane, carrying its type and instance token.
    #[must_use]
    pub fn for_pane(pane_id: &PaneId, position: Position, size: Size) -> Self {
        let mut item = Self::new(pane_id.to_string(), position, size);
        item.module_type = Some(pane_id.module_type());
        item.instance_id = pane_id.instance_id().map(ToString::to_string);
        item
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position { x: self.x, y: self.y }
    }

    /// Current size.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size { w: self.w, h: self.h }
    }

    /// Column just past the item's right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Row just past the item's bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

/// Items per breakpoint. All five breakpoints are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layouts {
    /// Large screens.
    #[serde(default)]
    pub lg: Vec<LayoutItem>,
    /// Medium screens.
    #[serde(default)]
    pub md: Vec<LayoutItem>,
    /// Small screens.
    #[serde(default)]
    pub sm: Vec<LayoutItem>,
    /// Extra small screens.
    #[serde(default)]
    pub xs: Vec<LayoutItem>,
    /// Smallest screens.
    #[serde(default)]
    pub xxs: Vec<LayoutItem>,
}

impl Layouts {
    /// Empty layouts for every breakpoint.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Items at a breakpoint.
    #[must_use]
    pub fn get(&self, breakpoint: Breakpoint) -> &[LayoutItem] {
        match breakpoint {
            Breakpoint::Lg => &self.lg,
            Breakpoint::Md => &self.md,
            Breakpoint::Sm => &self.sm,
            Breakpoint::Xs => &self.xs,
            Breakpoint::Xxs => &self.xxs,
        }
    }

    /// Mutable items at a breakpoint.
    pub fn get_mut(&mut self, breakpoint: Breakpoint) -> &mut Vec<LayoutItem> {
        match breakpoint {
            Breakpoint::Lg => &mut self.lg,
            Breakpoint::Md => &mut self.md,
            Breakpoint::Sm => &mut self.sm,
            Breakpoint::Xs => &mut self.xs,
            Breakpoint::Xxs => &mut self.xxs,
        }
    }

    /// Breakpoints paired with their items, widest first.
    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &[LayoutItem])> {
        Breakpoint::ALL.into_iter().map(move |bp| (bp, self.get(bp)))
    }

    /// Total number of items across breakpoints.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.iter().map(|(_, items)| items.len()).sum()
    }

    /// Whether no breakpoint holds any item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Raise every item's size to at least its minimums.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        for bp in Breakpoint::ALL {
            for item in self.get_mut(bp) {
                item.w = item.w.max(item.min_w);
                item.h = item.h.max(item.min_h);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_item_wire_names() {
        let pane = PaneId::parse("SYSTEM-SupervisorPane-ab12c").expect("pane");
        let item = LayoutItem::for_pane(&pane, Position { x: 1, y: 2 }, Size { w: 6, h: 4 });
        let json = serde_json::to_value(&item).expect("serialize");

        assert_eq!(json["i"], "SYSTEM-SupervisorPane-ab12c");
        assert_eq!(json["minW"], 3);
        assert_eq!(json["minH"], 3);
        assert_eq!(json["moduleType"], "SYSTEM");
        assert_eq!(json["instanceId"], "ab12c");
        assert!(json.get("static").is_none());
    }

    #[test]
    fn layout_item_defaults_minimums() {
        let raw = r#"{"i":"a","x":0,"y":0,"w":4,"h":4,"static":true}"#;
        let item: LayoutItem = serde_json::from_str(raw).expect("parse");
        assert_eq!(item.min_w, DEFAULT_MIN_W);
        assert_eq!(item.min_h, DEFAULT_MIN_H);
        assert_eq!(item.is_static, Some(true));
    }

    #[test]
    fn layouts_missing_breakpoints_deserialize_empty() {
        let layouts: Layouts = serde_json::from_str(r#"{"lg":[]}"#).expect("parse");
        assert!(layouts.is_empty());

        let json = serde_json::to_value(&layouts).expect("serialize");
        for bp in Breakpoint::ALL {
            assert!(json[bp.as_str()].as_array().is_some_and(Vec::is_empty));
        }
    }

    #[test]
    fn breakpoint_parse() {
        assert_eq!("xxs".parse::<Breakpoint>(), Ok(Breakpoint::Xxs));
        assert!("xl".parse::<Breakpoint>().is_err());
    }

    #[test]
    fn sanitized_applies_minimums() {
        let mut layouts = Layouts::empty();
        layouts.md.push(LayoutItem::new("a", Position::default(), Size { w: 1, h: 2 }));
        let clean = layouts.sanitized();
        assert_eq!(clean.md[0].size(), Size { w: 3, h: 3 });
    }

    #[test]
    fn item_edges() {
        let item = LayoutItem::new("a", Position { x: 2, y: 3 }, Size { w: 4, h: 5 });
        assert_eq!(item.right(), 6);
        assert_eq!(item.bottom(), 8);
    }
}
