//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::members::MemberRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait MembersRepo: Send + Sync {
    async fn find_member(&self, id: i64) -> Result<Option<MemberRecord>, RepoError>;
}

/// Connectivity probe used by the health route.
#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

/// A request-scoped database session.
///
/// Work is begun lazily; `commit` and `rollback` are no-ops when nothing is open.
/// Repository reads made through the session share its transaction.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn commit(&self) -> Result<(), RepoError>;
    async fn rollback(&self) -> Result<(), RepoError>;

    /// Member lookups bound to this session.
    fn members(&self) -> &dyn MembersRepo;
}

pub trait SessionFactory: Send + Sync {
    fn open(&self) -> std::sync::Arc<dyn UnitOfWork>;
}
