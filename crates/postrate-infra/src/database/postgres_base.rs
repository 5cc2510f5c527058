use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::{DbConn, DbErr, EntityTrait};

use postrate_core::error::RepoError;

/// Generic PostgreSQL repository, specialised per entity through type aliases.
/// Every repository shares one pooled connection.
pub struct PostgresRepository<E>
where
    E: EntityTrait,
{
    pub(crate) db: Arc<DbConn>,
    _entity: PhantomData<E>,
}

impl<E> PostgresRepository<E>
where
    E: EntityTrait,
{
    pub fn new(db: impl Into<Arc<DbConn>>) -> Self {
        Self {
            db: db.into(),
            _entity: PhantomData,
        }
    }
}

/// Map a SeaORM error onto the repository taxonomy.
pub(crate) fn db_err(e: DbErr) -> RepoError {
    match &e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => RepoError::Connection(e.to_string()),
        DbErr::RecordNotFound(_) => RepoError::NotFound,
        _ => {
            let err_str = e.to_string();
            if err_str.contains("duplicate") || err_str.contains("unique") {
                RepoError::Constraint(err_str)
            } else {
                RepoError::Query(err_str)
            }
        }
    }
}
