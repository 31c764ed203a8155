//! Per-pane layout edits across every breakpoint.

use vaio_proto::{Breakpoint, LayoutItem, Layouts, PaneId, Size};

use crate::grid::fitted_item;

/// Add a default-positioned item for `pane_id` to every breakpoint that
/// lacks one.
pub fn add_item_to_all_breakpoints(layouts: &mut Layouts, pane_id: &PaneId) {
    let key = pane_id.to_string();
    for bp in Breakpoint::ALL {
        let items = layouts.get_mut(bp);
        if items.iter().any(|item| item.i == key) {
            continue;
        }
        let item = fitted_item(pane_id, bp, items);
        items.push(item);
    }
}

/// Remove every item keyed `pane_id`. Returns the number removed.
pub fn remove_item_from_all_breakpoints(layouts: &mut Layouts, pane_id: &str) -> usize {
    let mut removed = 0;
    for bp in Breakpoint::ALL {
        let items = layouts.get_mut(bp);
        let before = items.len();
        items.retain(|item| item.i != pane_id);
        removed += before - items.len();
    }
    removed
}

/// First item keyed `pane_id`, searching the widest breakpoint first.
#[must_use]
pub fn find_layout_item<'a>(
    layouts: &'a Layouts,
    pane_id: &str,
) -> Option<(Breakpoint, &'a LayoutItem)> {
    layouts
        .iter()
        .find_map(|(bp, items)| items.iter().find(|item| item.i == pane_id).map(|item| (bp, item)))
}

/// Number of items keyed `pane_id` across all breakpoints.
#[must_use]
pub fn count_layout_items(layouts: &Layouts, pane_id: &str) -> usize {
    layouts
        .iter()
        .map(|(_, items)| items.iter().filter(|item| item.i == pane_id).count())
        .sum()
}

/// Resize `pane_id` at every breakpoint, clamped to the breakpoint's width
/// and the item's minimums. Returns whether any item changed.
pub fn update_item_size(layouts: &mut Layouts, pane_id: &str, size: Size) -> bool {
    let mut changed = false;
    for bp in Breakpoint::ALL {
        let cols = crate::grid::columns(bp);
        for item in layouts.get_mut(bp).iter_mut().filter(|item| item.i == pane_id) {
            let w = size.w.max(item.min_w).min(cols);
            let h = size.h.max(item.min_h);
            if (item.w, item.h) != (w, h) {
                item.w = w;
                item.h = h;
                changed = true;
            }
        }
    }
    changed
}
