// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User-visible, non-fatal notifications: a toast queue with TTL + dedupe.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// Informational note.
    Info,
    /// Warning that may need attention.
    Warn,
    /// Error requiring user awareness (e.g. a rolled-back save).
    Error,
}

/// Scope of a toast (who should see it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastScope {
    /// Visible regardless of the active workspace.
    Global,
    /// Tied to the active workspace; dropped on tenant switch.
    Workspace,
    /// Local to the current view only.
    Local,
}

/// Identifier for a toast entry.
pub type ToastId = u64;

/// Toast data stored in the service.
#[derive(Debug, Clone)]
pub struct Toast {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub kind: ToastKind,
    /// Scope.
    pub scope: ToastScope,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// Time-to-live duration.
    pub ttl: Duration,
    /// Creation time.
    pub created: Instant,
}

/// Rendering-friendly view of a toast.
#[derive(Debug, Clone, PartialEq)]
pub struct ToastRender {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub kind: ToastKind,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// 1.0 -> just created, 0.0 -> expired.
    pub progress: f32,
}

/// In-memory toast queue with TTL and a dedupe window.
pub struct ToastService {
    queue: VecDeque<Toast>,
    max: usize,
    dedupe_window: Duration,
    next_id: ToastId,
}

impl ToastService {
    /// Create a new queue with a maximum length.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a toast. An identical toast (kind/scope/title/body) pushed within
    /// the dedupe window refreshes the existing entry instead of stacking.
    pub fn push<S, B>(
        &mut self,
        kind: ToastKind,
        scope: ToastScope,
        title: S,
        body: B,
        ttl: Duration,
        now: Instant,
    ) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body = body.into();

        if let Some(existing) = self.queue.iter_mut().find(|t| {
            t.kind == kind
                && t.scope == scope
                && t.title == title
                && t.body == body
                && now.saturating_duration_since(t.created) <= self.dedupe_window
        }) {
            existing.created = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            id,
            kind,
            scope,
            title,
            body,
            ttl,
            created: now,
        });
        id
    }

    /// Remove a toast explicitly (user dismissed it).
    pub fn dismiss(&mut self, id: ToastId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|t| t.id != id);
        self.queue.len() != before
    }

    /// Drop workspace-scoped toasts (tenant switch / logout).
    pub fn clear_scope(&mut self, scope: ToastScope) {
        self.queue.retain(|t| t.scope != scope);
    }

    /// Drop expired toasts (call once per frame/tick).
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue
            .retain(|t| now.saturating_duration_since(t.created) < t.ttl);
    }

    /// Number of queued toasts, expired ones included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued toasts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    /// Return render-ready toasts with progress ratios.
    pub fn visible(&self, now: Instant) -> Vec<ToastRender> {
        self.queue
            .iter()
            .filter(|t| now.saturating_duration_since(t.created) < t.ttl)
            .map(|t| ToastRender {
                id: t.id,
                kind: t.kind,
                title: t.title.clone(),
                body: t.body.clone(),
                progress: 1.0
                    - (now.saturating_duration_since(t.created).as_secs_f32()
                        / t.ttl.as_secs_f32()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn identical_toasts_within_window_dedupe() {
        let mut toasts = ToastService::new(4);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(5);
        let a = toasts.push(ToastKind::Error, ToastScope::Workspace, "Save failed", None, ttl, t0);
        let b = toasts.push(
            ToastKind::Error,
            ToastScope::Workspace,
            "Save failed",
            None,
            ttl,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(a, b);
        assert_eq!(toasts.len(), 1);
    }

    #[test]
    fn queue_is_bounded_and_expires() {
        let mut toasts = ToastService::new(2);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(1);
        for title in ["a", "b", "c"] {
            toasts.push(ToastKind::Info, ToastScope::Local, title, None, ttl, t0);
        }
        let titles: Vec<_> = toasts.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["b", "c"]);

        toasts.retain_visible(t0 + Duration::from_secs(2));
        assert!(toasts.is_empty());
    }

    #[test]
    fn clear_scope_keeps_global() {
        let mut toasts = ToastService::new(8);
        let now = Instant::now();
        let ttl = Duration::from_secs(5);
        toasts.push(ToastKind::Warn, ToastScope::Global, "offline", None, ttl, now);
        toasts.push(ToastKind::Error, ToastScope::Workspace, "rolled back", None, ttl, now);
        toasts.clear_scope(ToastScope::Workspace);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts.visible(now)[0].title, "offline");
    }
}
