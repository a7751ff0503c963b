//! Distributed transaction coordinator: two-pass prepare/commit across
//! independent client handles with compensating rollback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::client::Client;
use crate::error::Result;
use crate::tx::Tx;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A forward operation run against an open transaction.
pub type Op = Box<dyn for<'c> Fn(&'c mut Tx<'static>) -> BoxFuture<'c, Result<()>> + Send + Sync>;
/// A compensating operation, run against the plain client (the original
/// transaction is gone by the time this runs). Takes an owned handle
/// rather than a borrow so the returned future can be `'static`.
pub type Undo = Box<dyn Fn(Arc<Client>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Session {
    client: Arc<Client>,
    committed: bool,
    ops: Vec<Op>,
    undo: Vec<Undo>,
}

/// Coordinates N sessions, each bound to one client, with a two-pass
/// prepare/commit protocol and post-commit compensation on rollback.
///
/// This is best-effort atomicity without a persistent log: pre-commit
/// failures are fully unwound by the driver (the open transaction is
/// simply dropped without committing); post-commit failures are reduced by
/// running the registered `undo` operations.
#[derive(Default)]
pub struct Dtc {
    sessions: Vec<Session>,
}

impl Dtc {
    /// A coordinator with no sessions yet.
    pub fn new() -> Dtc {
        Dtc {
            sessions: Vec::new(),
        }
    }

    /// Registers a `(do, undo)` pair against `client`. Pairs registered
    /// against the same client (compared by index) accumulate into one
    /// session instead of opening multiple transactions on it.
    pub fn prepare(&mut self, client: Arc<Client>, do_op: Op, undo_op: Undo) {
        if let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.client.index == client.index)
        {
            session.ops.push(do_op);
            session.undo.push(undo_op);
            return;
        }
        self.sessions.push(Session {
            client,
            committed: false,
            ops: vec![do_op],
            undo: vec![undo_op],
        });
    }

    /// Prepare pass then commit pass. On a prepare-pass failure, the
    /// still-open transactions are simply dropped (rolling back
    /// implicitly) and the error is returned. On a commit-pass failure,
    /// prior sessions remain committed.
    pub async fn commit(&mut self) -> Result<()> {
        let mut open: Vec<(usize, Tx<'static>)> = Vec::with_capacity(self.sessions.len());

        for i in 0..self.sessions.len() {
            let mut tx = self.sessions[i].client.begin().await?;

            let mut failure = None;
            for op in &self.sessions[i].ops {
                if let Err(e) = op(&mut tx).await {
                    failure = Some(e);
                    break;
                }
            }

            if let Some(e) = failure {
                return Err(e);
            }
            open.push((i, tx));
        }

        for (i, tx) in open {
            tx.commit().await?;
            self.sessions[i].committed = true;
        }

        Ok(())
    }

    /// For each session: if committed, run its `undo` operations against a
    /// fresh client connection, collecting every error; otherwise the
    /// session's transaction was never committed and already rolled back
    /// implicitly when it was dropped. Returns the compensation errors
    /// observed.
    pub async fn rollback(&mut self) -> Vec<crate::error::Error> {
        let mut errors = Vec::new();
        for session in &self.sessions {
            if session.committed {
                for undo in &session.undo {
                    if let Err(e) = undo(session.client.clone()).await {
                        errors.push(e);
                    }
                }
            }
        }
        errors
    }
}
