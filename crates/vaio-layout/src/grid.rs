//! Column table, default sizes and placement.

use vaio_proto::layout::{DEFAULT_H, DEFAULT_MIN_H, DEFAULT_MIN_W, DEFAULT_W};
use vaio_proto::{Breakpoint, LayoutItem, ModuleType, PaneId, Position, Size};

/// Column count of a breakpoint.
#[must_use]
pub const fn columns(breakpoint: Breakpoint) -> u32 {
    match breakpoint {
        Breakpoint::Lg => 48,
        Breakpoint::Md => 36,
        Breakpoint::Sm => 24,
        Breakpoint::Xs => 6,
        Breakpoint::Xxs => 2,
    }
}

const fn module_size(module_type: ModuleType) -> Size {
    match module_type {
        ModuleType::System => Size { w: 12, h: 8 },
        ModuleType::Service => Size { w: 12, h: 8 },
        ModuleType::User => Size { w: 12, h: 8 },
    }
}

/// Default size of a new pane, narrowed to fit the breakpoint.
#[must_use]
pub fn default_item_size(breakpoint: Breakpoint, module_type: Option<ModuleType>) -> Size {
    let base = module_type.map_or(
        Size {
            w: DEFAULT_W,
            h: DEFAULT_H,
        },
        module_size,
    );
    Size {
        w: base.w.min(columns(breakpoint)),
        h: base.h,
    }
}

/// Whether an item at `position` with `size` would overlap any of `items`.
#[must_use]
pub fn collision_exists(items: &[LayoutItem], position: Position, size: Size) -> bool {
    let right = position.x.saturating_add(size.w);
    let bottom = position.y.saturating_add(size.h);
    items.iter().any(|item| {
        position.x < item.right() && item.x < right && position.y < item.bottom() && item.y < bottom
    })
}

/// Where a new item of `size` goes at `breakpoint`.
///
/// An empty breakpoint starts at the origin. Otherwise the item is placed
/// right after the last occupied row's right-most item when it fits within
/// the column count and overlaps nothing, else at the start of a new row
/// below every existing item.
#[must_use]
pub fn compute_default_position(
    breakpoint: Breakpoint,
    existing: &[LayoutItem],
    size: Size,
) -> Position {
    let Some(last_row) = existing.iter().map(|item| item.y).max() else {
        return Position { x: 0, y: 0 };
    };
    let cols = columns(breakpoint);
    let w = size.w.min(cols);

    let row_end = existing
        .iter()
        .filter(|item| item.y == last_row)
        .map(LayoutItem::right)
        .max()
        .unwrap_or(0);
    let candidate = Position { x: row_end, y: last_row };
    if row_end.saturating_add(w) <= cols
        && !collision_exists(existing, candidate, Size { w, h: size.h })
    {
        return candidate;
    }

    let bottom = existing.iter().map(LayoutItem::bottom).max().unwrap_or(0);
    Position { x: 0, y: bottom }
}

/// A default-sized, default-positioned item for `pane_id` at `breakpoint`.
///
/// Minimums never exceed the item's own size, so narrow breakpoints keep a
/// valid item.
#[must_use]
pub fn fitted_item(
    pane_id: &PaneId,
    breakpoint: Breakpoint,
    existing: &[LayoutItem],
) -> LayoutItem {
    let size = default_item_size(breakpoint, Some(pane_id.module_type()));
    let position = compute_default_position(breakpoint, existing, size);
    let mut item = LayoutItem::for_pane(pane_id, position, size);
    item.min_w = DEFAULT_MIN_W.min(size.w);
    item.min_h = DEFAULT_MIN_H.min(size.h);
    item
}
