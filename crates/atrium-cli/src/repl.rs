// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Line commands typed while watching a workspace.

use crate::model::Task;
use atrium_app_core::render_port::Region;
use atrium_sync::{Mutation, PersistenceApi, SyncEngine, TxOutcome};
use serde_json::json;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

/// One parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `add <title...>`
    Add(String),
    /// `status <id> <status>`
    Status(String, String),
    /// `due <id> <date>`; `due <id> -` clears it.
    Due(String, Option<String>),
    /// `rm <id>`
    Remove(String),
    /// `move <id> <id>...`: the listed tasks swap into each other's slots.
    Move(Vec<String>),
    /// `list`
    List,
    /// `help`
    Help,
    /// `quit` / `exit`
    Quit,
}

const HELP: &str = "\
commands:
  add <title>            create a task
  status <id> <status>   set status (todo, doing, done)
  due <id> <date|->      set or clear the due date
  rm <id>                delete a task
  move <id> <id>...      reorder the listed tasks
  list                   redraw the page
  quit                   leave";

/// Parse one input line; blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let cmd = match (head, rest.as_slice()) {
        ("add", []) => return Err("add needs a title".into()),
        ("add", title) => Command::Add(title.join(" ")),
        ("status", [id, status]) => Command::Status((*id).into(), (*status).into()),
        ("due", [id, "-"]) => Command::Due((*id).into(), None),
        ("due", [id, date]) => Command::Due((*id).into(), Some((*date).into())),
        ("rm" | "delete", [id]) => Command::Remove((*id).into()),
        ("move", ids) if ids.len() >= 2 => {
            Command::Move(ids.iter().map(|s| (*s).to_string()).collect())
        }
        ("list" | "ls", []) => Command::List,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(format!("unknown or malformed command: {other} (try `help`)")),
    };
    Ok(Some(cmd))
}

fn mutation_for<A: PersistenceApi>(engine: &SyncEngine<A>, cmd: Command) -> Option<Mutation<Task>> {
    let session = engine.session();
    match cmd {
        Command::Add(title) => {
            let position = session.query::<Task, _>(|_| true).len();
            Some(Mutation::create(Task {
                id: session.issue_temp_id(),
                workspace_id: session.workspace(),
                title,
                status: "todo".into(),
                position: i64::try_from(position).unwrap_or(i64::MAX),
                due_date: None,
            }))
        }
        Command::Status(id, status) => Some(Mutation::update(id, json!({ "status": status }))),
        Command::Due(id, date) => Some(Mutation::update(id, json!({ "due_date": date }))),
        Command::Remove(id) => Some(Mutation::delete(id)),
        Command::Move(ids) => Some(Mutation::reorder(ids)),
        Command::List => {
            session.mark_dirty([Region::Page]);
            None
        }
        Command::Help => {
            println!("{HELP}");
            None
        }
        Command::Quit => None,
    }
}

fn report<A: PersistenceApi>(engine: &SyncEngine<A>, outcome: &TxOutcome) {
    match outcome {
        TxOutcome::Committed { tx, ids } => {
            let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
            println!("✓ {tx} saved ({})", ids.join(", "));
        }
        TxOutcome::RolledBack { tx, .. } => {
            let now = Instant::now();
            for toast in engine.session().with_toasts(|t| t.visible(now)) {
                println!("✗ {tx} {}: {}", toast.title, toast.body.unwrap_or_default());
            }
        }
        TxOutcome::Discarded { tx } => println!("… {tx} discarded (workspace changed)"),
    }
}

/// Read commands from stdin until `quit`, EOF or Ctrl-C, then flip `stop`.
pub async fn run<A: PersistenceApi>(engine: &SyncEngine<A>, stop: watch::Sender<bool>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("type `help` for commands");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let cmd = match parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        let Some(mutation) = mutation_for(engine, cmd) else {
            continue;
        };
        match engine.execute(mutation).await {
            Ok(outcome) => report(engine, &outcome),
            Err(err) => {
                warn!(error = %err, "command rejected");
                println!("! {err}");
            }
        }
        engine
            .session()
            .with_toasts(|t| t.retain_visible(Instant::now()));
    }
    let _ = stop.send(true);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(
            parse("add Call the bank").unwrap(),
            Some(Command::Add("Call the bank".into()))
        );
        assert_eq!(
            parse("status t-1 done").unwrap(),
            Some(Command::Status("t-1".into(), "done".into()))
        );
        assert_eq!(parse("due t-1 -").unwrap(), Some(Command::Due("t-1".into(), None)));
        assert_eq!(
            parse("move c a b").unwrap(),
            Some(Command::Move(vec!["c".into(), "a".into(), "b".into()]))
        );
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse("add").is_err());
        assert!(parse("status t-1").is_err());
        assert!(parse("move a").is_err());
        assert!(parse("frobnicate").is_err());
    }
}
