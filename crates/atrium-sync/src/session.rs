// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared engine state for one signed-in workspace.
//!
//! A [`Session`] is a cheap clonable handle. Every component (transaction
//! manager, reconciler, render scheduler) holds one and reaches the store
//! through it. All state sits behind `RefCell`s on a single thread; borrows
//! are scoped to synchronous sections and never live across an `.await`.

use crate::render::DirtyRegions;
use crate::temp_id::TempIdIssuer;
use crate::transaction::Ledger;
use atrium_app_core::prefs::SyncPrefs;
use atrium_app_core::render_port::Region;
use atrium_app_core::toast::{ToastKind, ToastScope, ToastService};
use atrium_store::{Entity, RecordId, Store, WorkspaceId};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;

struct Shared {
    store: RefCell<Store>,
    ledger: RefCell<Ledger>,
    temp_ids: RefCell<TempIdIssuer>,
    routes: RefCell<HashMap<String, Vec<Region>>>,
    toasts: RefCell<ToastService>,
    dirty: DirtyRegions,
    generations: watch::Sender<u64>,
    prefs: SyncPrefs,
}

/// Handle to the store, the transaction ledger and the UI side channels.
#[derive(Clone)]
pub struct Session {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &*self.shared.store.borrow())
            .field("generation", &self.generation())
            .field("pending", &self.pending_transactions())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session bound to `workspace`.
    pub fn new(workspace: WorkspaceId, prefs: SyncPrefs) -> Self {
        let temp_ids = TempIdIssuer::new(prefs.temp_id_prefix.clone());
        let toasts = ToastService::new(prefs.toast_capacity);
        Self {
            shared: Rc::new(Shared {
                store: RefCell::new(Store::new(workspace)),
                ledger: RefCell::new(Ledger::default()),
                temp_ids: RefCell::new(temp_ids),
                routes: RefCell::new(HashMap::new()),
                toasts: RefCell::new(toasts),
                dirty: DirtyRegions::default(),
                generations: watch::Sender::new(0),
                prefs,
            }),
        }
    }

    /// Register an entity type; changes to it dirty `regions`.
    pub fn register<E: Entity>(&self, regions: impl IntoIterator<Item = Region>) -> &Self {
        self.shared.store.borrow_mut().register::<E>();
        self.route(E::KIND, regions);
        self
    }

    /// Set the regions re-rendered when records of `kind` change.
    pub fn route(&self, kind: &str, regions: impl IntoIterator<Item = Region>) {
        let regions: Vec<Region> = regions.into_iter().collect();
        let mut routes = self.shared.routes.borrow_mut();
        if regions.is_empty() {
            routes.remove(kind);
        } else {
            routes.insert(kind.to_owned(), regions);
        }
    }

    /// Regions that depend on `kind`; the page when nothing was routed.
    pub fn regions_for(&self, kind: &str) -> Vec<Region> {
        self.shared
            .routes
            .borrow()
            .get(kind)
            .cloned()
            .unwrap_or_else(|| vec![Region::Page])
    }

    /// Read access to the store. Drop the guard before awaiting.
    pub fn store(&self) -> Ref<'_, Store> {
        self.shared.store.borrow()
    }

    /// Run a synchronous mutation against the store.
    pub fn update_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.shared.store.borrow_mut())
    }

    /// Read-only filter over one entity type.
    pub fn query<E, F>(&self, predicate: F) -> Vec<E>
    where
        E: Entity,
        F: FnMut(&E) -> bool,
    {
        self.shared.store.borrow().query(predicate)
    }

    /// Active workspace.
    pub fn workspace(&self) -> WorkspaceId {
        self.shared.store.borrow().workspace().clone()
    }

    /// Loaded preferences.
    pub fn prefs(&self) -> &SyncPrefs {
        &self.shared.prefs
    }

    /// Issue a temp id for a record about to be created optimistically.
    pub fn issue_temp_id(&self) -> RecordId {
        self.shared.temp_ids.borrow_mut().issue()
    }

    /// True when `id` has the temp-id form.
    pub fn is_temp_id(&self, id: &str) -> bool {
        self.shared.temp_ids.borrow().is_temp_id(id)
    }

    /// True when `id` was issued and still awaits its server id.
    pub fn is_outstanding_temp_id(&self, id: &str) -> bool {
        self.shared.temp_ids.borrow().is_outstanding(id)
    }

    pub(crate) fn temp_ids(&self) -> &RefCell<TempIdIssuer> {
        &self.shared.temp_ids
    }

    pub(crate) fn ledger(&self) -> &RefCell<Ledger> {
        &self.shared.ledger
    }

    /// Flag regions for the next render pass.
    pub fn mark_dirty(&self, regions: impl IntoIterator<Item = Region>) {
        self.shared.dirty.mark(regions);
    }

    /// Flag the regions routed for `kind`.
    pub fn mark_kind_dirty(&self, kind: &str) {
        self.mark_dirty(self.regions_for(kind));
    }

    /// Pending dirty regions and the render wake-up signal.
    pub fn dirty(&self) -> &DirtyRegions {
        &self.shared.dirty
    }

    /// Access the toast queue.
    pub fn with_toasts<R>(&self, f: impl FnOnce(&mut ToastService) -> R) -> R {
        f(&mut self.shared.toasts.borrow_mut())
    }

    pub(crate) fn toast_error(&self, title: &str, body: String) {
        let ttl = self.shared.prefs.error_toast_ttl();
        self.with_toasts(|t| {
            t.push(
                ToastKind::Error,
                ToastScope::Workspace,
                title,
                Some(body),
                ttl,
                Instant::now(),
            )
        });
    }

    /// Transactions begun and not yet resolved in the current generation.
    pub fn pending_transactions(&self) -> usize {
        self.shared.ledger.borrow().pending()
    }

    /// Store generation; bumped by every [`Session::reset`].
    pub fn generation(&self) -> u64 {
        self.shared.ledger.borrow().generation()
    }

    /// Notified with the new generation after every [`Session::reset`].
    pub fn watch_generation(&self) -> watch::Receiver<u64> {
        self.shared.generations.subscribe()
    }

    /// Tenant switch or logout: drop every record, bind to `workspace`, and
    /// orphan in-flight transactions so their late resolutions are ignored.
    pub fn reset(&self, workspace: WorkspaceId) {
        let previous = self.workspace();
        self.shared.store.borrow_mut().reset(workspace.clone());
        let orphaned = self.shared.ledger.borrow_mut().advance_generation();
        self.shared.temp_ids.borrow_mut().clear_outstanding();
        self.with_toasts(|t| t.clear_scope(ToastScope::Workspace));
        self.mark_dirty([Region::Header, Region::Sidebar, Region::Page]);
        self.shared.generations.send_replace(self.generation());
        info!(
            from = %previous,
            to = %workspace,
            orphaned,
            generation = self.generation(),
            "session reset"
        );
    }
}
