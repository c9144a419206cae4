// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]
use atrium_store::{Collection, Entity, RecordId, WorkspaceId};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Card {
    id: RecordId,
    workspace_id: WorkspaceId,
    label: u8,
}

impl Entity for Card {
    const KIND: &'static str = "cards";
    fn id(&self) -> &RecordId {
        &self.id
    }
    fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }
}

#[derive(Debug, Clone)]
enum Op {
    Upsert(u8, u8),
    Patch(u8, u8),
    PatchInPlace(u8, u8, u8),
    Remove(u8),
    ReplaceId(u8, u8),
    Move(u8, usize),
    UpsertAt(u8, usize),
}

fn id_of(n: u8) -> String {
    format!("c{}", n % 8)
}

fn card(n: u8, label: u8) -> Card {
    Card {
        id: id_of(n).into(),
        workspace_id: "ws".into(),
        label,
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::Upsert(a, b)),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::Patch(a, b)),
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(a, b, l)| Op::PatchInPlace(a, b, l)),
        any::<u8>().prop_map(Op::Remove),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::ReplaceId(a, b)),
        (any::<u8>(), 0usize..12).prop_map(|(a, i)| Op::Move(a, i)),
        (any::<u8>(), 0usize..12).prop_map(|(a, i)| Op::UpsertAt(a, i)),
    ]
}

proptest! {
    #[test]
    fn ids_stay_unique_under_any_operation_sequence(ops in prop::collection::vec(op(), 0..64)) {
        let mut c: Collection<Card> = Collection::new();
        for op in ops {
            match op {
                Op::Upsert(n, l) => { c.upsert(card(n, l)).unwrap(); }
                Op::Patch(n, l) => {
                    let patch = json!({"id": id_of(n), "workspace_id": "ws", "label": l});
                    c.upsert_patch(&patch).unwrap();
                }
                Op::PatchInPlace(n, renamed, l) => {
                    // a patch naming another id must be refused
                    let patch = json!({"id": id_of(renamed), "label": l});
                    let result = c.patch(&id_of(n), &patch);
                    if id_of(n) != id_of(renamed) {
                        prop_assert!(result.is_err());
                    }
                }
                Op::Remove(n) => { let _ = c.remove(&id_of(n)); }
                Op::ReplaceId(a, b) => { c.replace_id(&id_of(a), card(b, 0)); }
                Op::Move(n, i) => { let _ = c.move_to(&id_of(n), i); }
                Op::UpsertAt(n, i) => { c.upsert_at(card(n, 1), i); }
            }
            let mut seen = HashSet::new();
            for rec in &c {
                prop_assert!(seen.insert(rec.id.clone()), "duplicate id {}", rec.id);
            }
        }
    }

    #[test]
    fn removing_missing_ids_never_changes_the_collection(n in 0u8..8) {
        let mut c = Collection::from_records((0..4).map(|i| card(i, i))).unwrap();
        let before = c.ids();
        let _ = c.remove(&format!("missing-{n}"));
        prop_assert_eq!(before, c.ids());
    }
}
