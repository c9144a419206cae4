// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixture entities and pre-seeded sessions.

use atrium_app_core::prefs::SyncPrefs;
use atrium_app_core::render_port::Region;
use atrium_store::{Entity, RecordId, UpsertMode, WorkspaceId};
use atrium_sync::Session;
use serde::{Deserialize, Serialize};

/// Workspace every fixture record belongs to.
pub const WORKSPACE: &str = "ws-1";

/// Task list item with a manual sort position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Record id.
    pub id: RecordId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Short title.
    pub title: String,
    /// Workflow status (`todo`, `doing`, `done`).
    pub status: String,
    /// Manual sort position.
    #[serde(default)]
    pub position: i64,
    /// Optional assignee.
    #[serde(default)]
    pub assignee: Option<String>,
}

impl Entity for Task {
    const KIND: &'static str = "tasks";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }
}

/// Build a task in [`WORKSPACE`].
pub fn task(id: &str, title: &str, status: &str) -> Task {
    Task {
        id: id.into(),
        workspace_id: WORKSPACE.into(),
        title: title.into(),
        status: status.into(),
        position: 0,
        assignee: None,
    }
}

/// Sales pipeline deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Record id.
    pub id: RecordId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Deal name.
    pub name: String,
    /// Pipeline stage.
    pub stage: String,
    /// Value in cents.
    #[serde(default)]
    pub amount_cents: i64,
}

impl Entity for Deal {
    const KIND: &'static str = "deals";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }
}

/// Build a deal in [`WORKSPACE`].
pub fn deal(id: &str, name: &str, stage: &str) -> Deal {
    Deal {
        id: id.into(),
        workspace_id: WORKSPACE.into(),
        name: name.into(),
        stage: stage.into(),
        amount_cents: 0,
    }
}

/// Session for [`WORKSPACE`] with both fixture entities registered.
///
/// Tasks render into the page, deals into the side panel. The dirty set is
/// empty on return.
pub fn session(prefs: SyncPrefs) -> Session {
    let session = Session::new(WORKSPACE.into(), prefs);
    session.register::<Task>([Region::Page]);
    session.register::<Deal>([Region::SidePanel]);
    session.dirty().take();
    session
}

/// [`session`] with default prefs, pre-seeded with `tasks` in order.
pub fn session_with_tasks(tasks: impl IntoIterator<Item = Task>) -> Session {
    let session = session(SyncPrefs::default());
    for t in tasks {
        // fixture records are well-formed; a failed merge would be a fixture bug
        let _ = session.upsert(t, UpsertMode::Replace);
    }
    session.dirty().take();
    session
}

/// Task ids in display order.
pub fn task_ids(session: &Session) -> Vec<String> {
    session
        .query::<Task, _>(|_| true)
        .into_iter()
        .map(|t| t.id.to_string())
        .collect()
}
