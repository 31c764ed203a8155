//! Reconciliation of a layout with the active module list.

use std::collections::HashSet;

use tracing::debug;
use vaio_proto::{Breakpoint, Layouts, PaneId};

use crate::grid::fitted_item;

/// Result of [`synchronize_layout_and_modules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synchronized {
    /// Layouts covering every module at every breakpoint.
    pub layouts: Layouts,
    /// Modules in layout order.
    pub modules: Vec<String>,
}

/// Reconcile `layouts` with `active_modules`.
///
/// Items with an unparseable pane id are dropped, as are repeated ids
/// within one breakpoint. Layout items are never dropped for being absent
/// from `active_modules`: the module list is rebuilt in the order panes
/// first appear in the layout (widest breakpoint first), active modules
/// missing from the layout are appended, and every breakpoint gains a
/// default-positioned item for each module it lacks.
///
/// Applying this to its own output returns the output unchanged.
#[must_use]
pub fn synchronize_layout_and_modules(
    layouts: &Layouts,
    active_modules: &[String],
) -> Synchronized {
    let mut cleaned = Layouts::empty();
    let mut modules: Vec<PaneId> = Vec::new();
    let mut seen_modules: HashSet<String> = HashSet::new();

    for (bp, items) in layouts.iter() {
        let mut seen_here: HashSet<String> = HashSet::new();
        let out = cleaned.get_mut(bp);
        for item in items {
            let Ok(pane_id) = PaneId::parse(&item.i) else {
                debug!(breakpoint = %bp, id = %item.i, "dropping layout item with invalid pane id");
                continue;
            };
            // Ids are compared in canonical form so `system-X-1` and
            // `SYSTEM-X-1` name the same pane.
            let key = pane_id.to_string();
            if !seen_here.insert(key.clone()) {
                continue;
            }
            let mut item = item.clone();
            item.i.clone_from(&key);
            if seen_modules.insert(key) {
                modules.push(pane_id);
            }
            out.push(item);
        }
    }

    for id in active_modules {
        match PaneId::parse(id) {
            Ok(pane_id) => {
                if seen_modules.insert(pane_id.to_string()) {
                    modules.push(pane_id);
                }
            }
            Err(_) => debug!(id = %id, "dropping invalid active module"),
        }
    }

    for bp in Breakpoint::ALL {
        let items = cleaned.get_mut(bp);
        let present: HashSet<String> = items.iter().map(|item| item.i.clone()).collect();
        for pane_id in &modules {
            if present.contains(&pane_id.to_string()) {
                continue;
            }
            let item = fitted_item(pane_id, bp, items);
            items.push(item);
        }
    }

    Synchronized {
        layouts: cleaned,
        modules: modules.iter().map(ToString::to_string).collect(),
    }
}

/// Drop every item whose pane is not in `modules`.
#[must_use]
pub fn prune_orphans(layouts: &Layouts, modules: &[String]) -> Layouts {
    let keep: HashSet<&str> = modules.iter().map(String::as_str).collect();
    let mut out = layouts.clone();
    for bp in Breakpoint::ALL {
        out.get_mut(bp).retain(|item| keep.contains(item.i.as_str()));
    }
    out
}
