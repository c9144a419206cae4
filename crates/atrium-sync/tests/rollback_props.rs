// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property: any rejected mutation leaves the store exactly as it was.
#![allow(clippy::unwrap_used)]

use atrium_dry_tests::{session_with_tasks, task, Reply, ScriptedApi, Task};
use atrium_sync::{Mutation, SyncEngine, TxOutcome};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Status(usize, &'static str),
    Delete(usize),
    Reorder(Vec<usize>),
    Create(Option<usize>),
}

fn op_strategy(len: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..len, prop::sample::select(vec!["todo", "doing", "done"]))
            .prop_map(|(i, s)| Op::Status(i, s)),
        (0..len).prop_map(Op::Delete),
        Just((0..len).collect::<Vec<_>>())
            .prop_shuffle()
            .prop_flat_map(move |perm| (Just(perm), 1..=len))
            .prop_map(|(perm, take)| Op::Reorder(perm.into_iter().take(take).collect())),
        proptest::option::of(0..=len).prop_map(Op::Create),
    ]
}

fn scenario() -> impl Strategy<Value = (Vec<Task>, Op)> {
    (1usize..8).prop_flat_map(|len| {
        let tasks = (0..len)
            .map(|i| {
                let mut t = task(&format!("t{i}"), &format!("Task {i}"), "todo");
                t.position = i64::try_from(i).unwrap_or_default();
                t
            })
            .collect::<Vec<_>>();
        (Just(tasks), op_strategy(len))
    })
}

proptest! {
    #[test]
    fn rejected_mutation_restores_store((tasks, op) in scenario()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let session = session_with_tasks(tasks.clone());
        let api = ScriptedApi::new();
        for _ in 0..tasks.len() {
            api.push(Reply::Server("rejected".into()));
        }
        let engine = SyncEngine::new(session.clone(), api);
        let id = |i: usize| tasks[i].id.clone();

        let mutation = match op {
            Op::Status(i, s) => Mutation::update(id(i), json!({"status": s})),
            Op::Delete(i) => Mutation::delete(id(i)),
            Op::Reorder(perm) => Mutation::reorder(perm.into_iter().map(id)),
            Op::Create(index) => {
                let temp = session.issue_temp_id();
                Mutation::Create { record: task(temp.as_str(), "New", "todo"), index }
            }
        };
        let outcome = rt.block_on(engine.execute(mutation)).unwrap();

        let rolled_back = matches!(outcome, TxOutcome::RolledBack { .. });
        prop_assert!(rolled_back);
        prop_assert_eq!(session.query::<Task, _>(|_| true), tasks);
        prop_assert_eq!(session.pending_transactions(), 0);
    }
}
