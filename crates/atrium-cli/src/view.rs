// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Terminal projection and render port.

use crate::model::Task;
use atrium_app_core::render_port::{Region, RenderPort};
use atrium_store::Store;

/// Lines drawn for one region.
pub type Lines = Vec<String>;

/// Project the task page; other regions are not drawn by this client.
pub fn project(region: &Region, store: &Store) -> Option<Lines> {
    if *region != Region::Page {
        return None;
    }
    let tasks = store.collection::<Task>()?;
    let mut lines = vec![format!("── {} · {} tasks ──", store.workspace(), tasks.len())];
    lines.extend(tasks.iter().map(|t| {
        let mark = match t.status.as_str() {
            "done" => 'x',
            "doing" => '~',
            _ => ' ',
        };
        match &t.due_date {
            Some(due) => format!("[{mark}] {:<10} {} (due {due})", t.id.as_str(), t.title),
            None => format!("[{mark}] {:<10} {}", t.id.as_str(), t.title),
        }
    }));
    Some(lines)
}

/// Writes committed regions to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderPort;

impl RenderPort<Lines> for TerminalRenderPort {
    fn commit(&self, _region: &Region, view: &Lines) {
        for line in view {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn page_lists_tasks_in_store_order() {
        let mut store = Store::new("ws-1".into());
        for (id, status) in [("b", "done"), ("a", "todo")] {
            store
                .upsert(Task {
                    id: id.into(),
                    workspace_id: "ws-1".into(),
                    title: format!("task {id}"),
                    status: status.into(),
                    position: 0,
                    due_date: None,
                })
                .unwrap();
        }
        let lines = project(&Region::Page, &store).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("[x] b"));
        assert!(lines[2].starts_with("[ ] a"));
        assert!(project(&Region::Header, &store).is_none());
    }
}
