// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generic optimistic-mutation driver shared by every feature.

use crate::error::{NetworkError, SyncError};
use crate::mutation::Mutation;
use crate::persist::{self, PersistReply, PersistenceApi};
use crate::session::Session;
use crate::transaction::{Resolution, Transaction, TxId};
use atrium_store::{value_id, Entity, RecordId};
use serde_json::Value;
use tracing::{info, instrument};

/// How an executed mutation ended.
#[derive(Debug)]
pub enum TxOutcome {
    /// Server confirmed; `ids` are the final ids of the affected records.
    Committed {
        /// Transaction id.
        tx: TxId,
        /// Final ids (server ids for creations).
        ids: Vec<RecordId>,
    },
    /// Persist failed; local state was restored and a toast raised.
    RolledBack {
        /// Transaction id.
        tx: TxId,
        /// Why the server call failed.
        reason: SyncError,
    },
    /// The session was reset while the call was in flight; nothing applied.
    Discarded {
        /// Transaction id.
        tx: TxId,
    },
}

impl TxOutcome {
    /// True for [`TxOutcome::Committed`].
    pub fn is_committed(&self) -> bool {
        matches!(self, TxOutcome::Committed { .. })
    }

    /// Transaction id.
    pub fn tx(&self) -> TxId {
        match self {
            TxOutcome::Committed { tx, .. }
            | TxOutcome::RolledBack { tx, .. }
            | TxOutcome::Discarded { tx } => *tx,
        }
    }
}

/// Runs [`Mutation`]s through begin, apply, persist and resolve.
pub struct SyncEngine<A> {
    session: Session,
    api: A,
}

impl<A: PersistenceApi> SyncEngine<A> {
    /// Bind an API adapter to `session`.
    pub fn new(session: Session, api: A) -> Self {
        Self { session, api }
    }

    /// Shared session handle.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Persistence adapter.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Execute one mutation as one transaction.
    ///
    /// Returns `Err` only when the mutation is rejected before the network
    /// call (validation or local apply failure). Network and server failures
    /// roll back and surface as [`TxOutcome::RolledBack`].
    #[instrument(skip(self, mutation), fields(kind = E::KIND, op = mutation.op_name()))]
    pub async fn execute<E: Entity>(&self, mutation: Mutation<E>) -> Result<TxOutcome, SyncError> {
        mutation.validate(&self.session)?;
        let request = mutation.persist_request(&self.session)?;
        let affected = mutation.affected_ids();

        let mut tx = self.session.begin::<E>(&affected);
        if let Mutation::Create { record, .. } = &mutation {
            tx.track_created(record.id().clone());
        }
        self.session.apply(&mut tx, |c| mutation.apply(c))?;

        let limit = self.session.prefs().transaction_timeout();
        let replies = match tokio::time::timeout(limit, persist::send(&self.api, E::KIND, request)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(limit).into()),
        };

        let outcome = match replies {
            Ok(replies) => self.resolve_success(&mut tx, affected, &replies),
            Err(reason) => self.resolve_failure(&mut tx, reason),
        };
        info!(tx = %outcome.tx(), committed = outcome.is_committed(), "transaction finished");
        Ok(outcome)
    }

    fn resolve_success<E: Entity>(
        &self,
        tx: &mut Transaction<E>,
        mut ids: Vec<RecordId>,
        replies: &[PersistReply],
    ) -> TxOutcome {
        let resolution = match (tx.created_temp_id().cloned(), replies) {
            (Some(temp), [PersistReply::Created(canonical)]) => {
                match self.session.commit_created(tx, &temp, canonical) {
                    Ok(resolution) => {
                        if let Some(permanent) = value_id(canonical) {
                            ids = vec![permanent];
                        }
                        resolution
                    }
                    Err(reason) => return self.resolve_failure(tx, reason),
                }
            }
            (Some(_), _) => {
                let reason = SyncError::server("creation returned no record");
                return self.resolve_failure(tx, reason);
            }
            (None, replies) => {
                let canonical: Vec<Value> = replies
                    .iter()
                    .filter_map(PersistReply::canonical)
                    .cloned()
                    .collect();
                self.session.commit(tx, &canonical)
            }
        };
        match resolution {
            Resolution::Stale => TxOutcome::Discarded { tx: tx.id() },
            _ => TxOutcome::Committed { tx: tx.id(), ids },
        }
    }

    fn resolve_failure<E: Entity>(&self, tx: &mut Transaction<E>, reason: SyncError) -> TxOutcome {
        match self.session.rollback(tx, &reason) {
            Resolution::Stale => TxOutcome::Discarded { tx: tx.id() },
            _ => TxOutcome::RolledBack { tx: tx.id(), reason },
        }
    }
}
