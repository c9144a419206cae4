// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render scheduling: dirty-region accumulation, pure projection, commit.
//!
//! A render pass is split in two. [`project_view_model`] derives views for
//! the dirty regions from the store and touches nothing else; the
//! [`RenderPort`] then commits those views to the real surface. Marks made
//! in one synchronous turn share a single [`Notify`] permit, so the render
//! loop wakes once per turn no matter how many marks were made.

use crate::session::Session;
use atrium_app_core::render_port::{Region, RenderPort};
use atrium_store::Store;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

/// Regions flagged since the last render pass.
#[derive(Debug, Default)]
pub struct DirtyRegions {
    set: RefCell<BTreeSet<Region>>,
    signal: Notify,
}

impl DirtyRegions {
    /// Add regions and wake the render loop.
    pub fn mark<I>(&self, regions: I)
    where
        I: IntoIterator<Item = Region>,
    {
        let mut set = self.set.borrow_mut();
        set.extend(regions);
        if !set.is_empty() {
            self.signal.notify_one();
        }
    }

    /// Drain the set.
    pub fn take(&self) -> BTreeSet<Region> {
        std::mem::take(&mut *self.set.borrow_mut())
    }

    /// Copy of the current set.
    pub fn peek(&self) -> BTreeSet<Region> {
        self.set.borrow().clone()
    }

    /// True when nothing awaits rendering.
    pub fn is_empty(&self) -> bool {
        self.set.borrow().is_empty()
    }

    /// Resolve once at least one mark happened since the last wake-up.
    pub async fn wait(&self) {
        self.signal.notified().await;
    }
}

/// Pure derivation of one region's view from store state.
pub trait ViewProjector {
    /// View type handed to the render port.
    type View;

    /// Project `region`; `None` when this projector does not draw it.
    fn project(&self, region: &Region, store: &Store) -> Option<Self::View>;
}

impl<V, F> ViewProjector for F
where
    F: Fn(&Region, &Store) -> Option<V>,
{
    type View = V;

    fn project(&self, region: &Region, store: &Store) -> Option<V> {
        self(region, store)
    }
}

/// Views for a set of regions, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel<V> {
    /// Projected view per region.
    pub regions: BTreeMap<Region, V>,
}

impl<V> Default for ViewModel<V> {
    fn default() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }
}

/// Project `regions` from `store`; reads only.
pub fn project_view_model<P>(
    projector: &P,
    store: &Store,
    regions: &BTreeSet<Region>,
) -> ViewModel<P::View>
where
    P: ViewProjector,
{
    ViewModel {
        regions: regions
            .iter()
            .filter_map(|r| projector.project(r, store).map(|v| (r.clone(), v)))
            .collect(),
    }
}

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Regions that were dirty.
    pub dirty: BTreeSet<Region>,
    /// Regions the projector produced a view for and that got committed.
    pub committed: Vec<Region>,
}

/// Coarse, idempotent re-renderer driven by a session's dirty regions.
pub struct RenderScheduler<P, R> {
    session: Session,
    projector: P,
    port: R,
    passes: Cell<u64>,
}

impl<P, R> RenderScheduler<P, R>
where
    P: ViewProjector,
    R: RenderPort<P::View>,
{
    /// Wire a projector and a render port to `session`.
    pub fn new(session: Session, projector: P, port: R) -> Self {
        Self {
            session,
            projector,
            port,
            passes: Cell::new(0),
        }
    }

    /// Borrow the render port.
    pub fn port(&self) -> &R {
        &self.port
    }

    /// Number of non-empty render passes so far.
    pub fn passes(&self) -> u64 {
        self.passes.get()
    }

    /// Re-render exactly the dirty regions and clear the set. A flush with
    /// nothing dirty does nothing.
    pub fn flush(&self) -> FlushReport {
        let dirty = self.session.dirty().take();
        if dirty.is_empty() {
            return FlushReport::default();
        }
        let model = {
            let store = self.session.store();
            project_view_model(&self.projector, &store, &dirty)
        };
        let mut committed = Vec::with_capacity(model.regions.len());
        for (region, view) in &model.regions {
            self.port.commit(region, view);
            committed.push(region.clone());
        }
        self.port.request_redraw();
        self.passes.set(self.passes.get() + 1);
        debug!(pass = self.passes.get(), regions = ?committed, "render pass");
        FlushReport { dirty, committed }
    }

    /// Render loop: one flush per wake-up until `shutdown` flips to true or
    /// its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("render loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                () = self.session.dirty().wait() => {
                    self.flush();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(passes = self.passes.get(), "render loop stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn marks_accumulate_until_taken() {
        let dirty = DirtyRegions::default();
        dirty.mark([Region::Page]);
        dirty.mark([Region::Sidebar, Region::Page]);
        assert_eq!(dirty.peek().len(), 2);
        let taken = dirty.take();
        assert!(taken.contains(&Region::Sidebar));
        assert!(dirty.is_empty());
    }

    #[tokio::test]
    async fn many_marks_store_one_wakeup() {
        let dirty = DirtyRegions::default();
        for _ in 0..5 {
            dirty.mark([Region::Header]);
        }
        dirty.wait().await;
        let second = tokio::time::timeout(std::time::Duration::from_millis(10), dirty.wait()).await;
        assert!(second.is_err(), "only one permit should be stored");
    }
}
