// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Records this client knows how to show.

use atrium_store::{Entity, RecordId, WorkspaceId};
use serde::{Deserialize, Serialize};

/// Task list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Record id.
    pub id: RecordId,
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Short title.
    pub title: String,
    /// Workflow status.
    #[serde(default = "default_status")]
    pub status: String,
    /// Manual sort position.
    #[serde(default)]
    pub position: i64,
    /// Optional due date (ISO-8601 date).
    #[serde(default)]
    pub due_date: Option<String>,
}

fn default_status() -> String {
    "todo".to_string()
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
