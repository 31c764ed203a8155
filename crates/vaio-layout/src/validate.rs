//! Validation and normalization of untrusted layout JSON.

use serde_json::{Map, Value};
use tracing::debug;
use vaio_proto::layout::{DEFAULT_H, DEFAULT_MIN_H, DEFAULT_MIN_W, DEFAULT_W};
use vaio_proto::{Breakpoint, LayoutItem, Layouts, ModuleType};

const REQUIRED_CELLS: [&str; 4] = ["x", "y", "w", "h"];

/// Convert a JSON number to a grid cell, flooring and clamping at zero.
fn cell(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    Some(n.floor().clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn pane_key(item: &Map<String, Value>) -> Option<&str> {
    item.get("i").and_then(Value::as_str).filter(|i| !i.is_empty())
}

fn is_valid_item(item: &Value) -> bool {
    let Some(item) = item.as_object() else {
        return false;
    };
    pane_key(item).is_some()
        && REQUIRED_CELLS
            .iter()
            .all(|key| item.get(*key).is_some_and(Value::is_number))
}

/// Whether `layouts` is a usable layout object.
///
/// The value must be an object, and every breakpoint present in it must be
/// an array whose items carry a non-empty string `i` and numeric `x`, `y`,
/// `w`, `h`. Missing breakpoints are allowed.
#[must_use]
pub fn validate_layout(layouts: &Value) -> bool {
    let Some(map) = layouts.as_object() else {
        return false;
    };
    Breakpoint::ALL.iter().all(|bp| match map.get(bp.as_str()) {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.iter().all(is_valid_item),
        Some(_) => false,
    })
}

/// Build a typed item from a JSON object, filling any missing number.
fn item_from_map(item: &Map<String, Value>, i: &str) -> LayoutItem {
    let num = |key: &str, default: u32| item.get(key).and_then(cell).unwrap_or(default);
    LayoutItem {
        i: i.to_string(),
        x: num("x", 0),
        y: num("y", 0),
        w: num("w", DEFAULT_W),
        h: num("h", DEFAULT_H),
        min_w: num("minW", DEFAULT_MIN_W),
        min_h: num("minH", DEFAULT_MIN_H),
        module_type: item
            .get("moduleType")
            .and_then(Value::as_str)
            .and_then(ModuleType::parse),
        instance_id: item
            .get("instanceId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string),
        is_static: item.get("static").and_then(Value::as_bool),
    }
}

fn collect_items(layouts: &Value, keep: impl Fn(&Value) -> Option<LayoutItem>) -> Layouts {
    let mut out = Layouts::empty();
    let Some(map) = layouts.as_object() else {
        return out;
    };
    for bp in Breakpoint::ALL {
        let Some(items) = map.get(bp.as_str()).and_then(Value::as_array) else {
            continue;
        };
        let kept: Vec<LayoutItem> = items.iter().filter_map(&keep).collect();
        let dropped = items.len() - kept.len();
        if dropped > 0 {
            debug!(breakpoint = %bp, dropped, "dropped invalid layout items");
        }
        *out.get_mut(bp) = kept;
    }
    out
}

/// Typed layouts holding only the valid items of `layouts`.
///
/// All five breakpoints are present in the result. Invalid items are
/// dropped rather than repaired; negative or fractional cells are floored
/// and clamped at zero.
#[must_use]
pub fn normalize_layouts(layouts: &Value) -> Layouts {
    collect_items(layouts, |item| {
        if !is_valid_item(item) {
            return None;
        }
        let map = item.as_object()?;
        Some(item_from_map(map, pane_key(map)?))
    })
}

/// Layouts reduced to the canonical persisted field set.
///
/// Items without a pane key are dropped; missing numbers default to
/// `w=12, h=8, minW=3, minH=3` and `x=y=0`; sizes are raised to their
/// minimums.
#[must_use]
pub fn sanitize_for_storage(layouts: &Value) -> Layouts {
    collect_items(layouts, |item| {
        let map = item.as_object()?;
        Some(item_from_map(map, pane_key(map)?))
    })
    .sanitized()
}
