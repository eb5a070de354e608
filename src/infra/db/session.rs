use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Postgres, Transaction, postgres::PgPool};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::application::repos::{MembersRepo, RepoError, SessionFactory, UnitOfWork};
use crate::domain::members::MemberRecord;

use super::map_sqlx_error;
use super::members::find_member;

/// Request-scoped session over the shared pool.
///
/// A transaction is begun on first use and held until `commit` or `rollback`.
/// Member lookups made through the session run inside that transaction.
/// Dropping the session with a transaction still open rolls it back.
pub struct PgSession {
    pool: PgPool,
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgSession {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    /// Borrow the open transaction, beginning one if needed.
    pub async fn transaction(
        &self,
    ) -> Result<MappedMutexGuard<'_, Transaction<'static, Postgres>>, RepoError> {
        let mut guard = self.tx.lock().await;
        self.begin_if_idle(&mut guard).await?;
        MutexGuard::try_map(guard, |slot| slot.as_mut())
            .map_err(|_| RepoError::from_persistence("transaction slot emptied while locked"))
    }

    pub async fn is_open(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    async fn begin_if_idle(
        &self,
        slot: &mut Option<Transaction<'static, Postgres>>,
    ) -> Result<(), RepoError> {
        if slot.is_none() {
            *slot = Some(self.pool.begin().await.map_err(map_sqlx_error)?);
        }
        Ok(())
    }
}

#[async_trait]
impl MembersRepo for PgSession {
    async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError> {
        let mut guard = self.tx.lock().await;
        self.begin_if_idle(&mut guard).await?;
        let tx = guard
            .as_mut()
            .ok_or_else(|| RepoError::from_persistence("transaction slot emptied while locked"))?;
        find_member(&mut **tx, id).await
    }
}

#[async_trait]
impl UnitOfWork for PgSession {
    async fn commit(&self) -> Result<(), RepoError> {
        let open = self.tx.lock().await.take();
        match open {
            Some(tx) => tx.commit().await.map_err(map_sqlx_error),
            None => Ok(()),
        }
    }

    async fn rollback(&self) -> Result<(), RepoError> {
        let open = self.tx.lock().await.take();
        match open {
            Some(tx) => tx.rollback().await.map_err(map_sqlx_error),
            None => Ok(()),
        }
    }

    fn members(&self) -> &dyn MembersRepo {
        self
    }
}

#[derive(Clone)]
pub struct PgSessionFactory {
    pool: PgPool,
}

impl PgSessionFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionFactory for PgSessionFactory {
    fn open(&self) -> Arc<dyn UnitOfWork> {
        Arc::new(PgSession::new(self.pool.clone()))
    }
}
