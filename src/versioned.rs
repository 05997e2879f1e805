//! Optimistic concurrency for mutable records.
//!
//! Every update names the `version` the caller last read. The store applies
//! the write only while that version is still current, bumps it by one and
//! refreshes `updated_at`; otherwise the caller gets
//! [`ModelError::EditConflict`] and must re-read before retrying. No row lock
//! outlives the single conditional statement.
//!
//! [`update_versioned`] is the Postgres rendition, [`MemoryTable`] applies the
//! same compare-and-swap in process.

#[cfg(test)]
use std::collections::BTreeMap;

#[cfg(test)]
use parking_lot::Mutex;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{db::Database, error::ModelError};

/// A column value written by a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Bool(bool),
    SmallInt(i16),
    BigInt(i64),
}

pub trait Versioned: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> i64;
    fn version(&self) -> i32;

    /// Mutable columns, in the order they are written.
    fn fields(&self) -> Vec<(&'static str, Field)>;

    /// `(constraint, value)` pairs that must be unique across the table.
    #[cfg(test)]
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Overwrites the bookkeeping columns with the values the store assigned.
    fn stamp(&mut self, updated_at: OffsetDateTime, version: i32);

    /// Assigns identity for a freshly inserted record.
    #[cfg(test)]
    fn created(&mut self, id: i64, at: OffsetDateTime);
}

pub(crate) fn conditional_update<T: Versioned>(entity: &T) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", T::TABLE));
    {
        let mut set = qb.separated(", ");
        for (column, value) in entity.fields() {
            set.push(format!("{column} = "));
            match value {
                Field::Text(v) => set.push_bind_unseparated(v),
                Field::Bool(v) => set.push_bind_unseparated(v),
                Field::SmallInt(v) => set.push_bind_unseparated(v),
                Field::BigInt(v) => set.push_bind_unseparated(v),
            };
        }
        set.push("version = version + 1");
        set.push("updated_at = NOW()");
    }
    qb.push(" WHERE id = ")
        .push_bind(entity.id())
        .push(" AND version = ")
        .push_bind(entity.version())
        .push(" RETURNING updated_at, version");
    qb
}

/// Applies `entity` if its `version` is still current and refreshes the
/// caller's copy with the stored bookkeeping values.
pub async fn update_versioned<T: Versioned>(db: &Database, entity: &mut T) -> Result<(), ModelError> {
    let mut qb = conditional_update(&*entity);
    let result = db
        .bounded(
            qb.build_query_as::<(OffsetDateTime, i32)>()
                .fetch_one(db.pool()),
        )
        .await;

    match result {
        Ok((updated_at, version)) => {
            entity.stamp(updated_at, version);
            Ok(())
        }
        Err(ModelError::NotFound) => Err(ModelError::EditConflict),
        Err(e) => Err(e),
    }
}

/// In-process table keyed by id, enforcing the same version and uniqueness
/// rules as the Postgres schema.
#[cfg(test)]
pub struct MemoryTable<T> {
    inner: Mutex<Rows<T>>,
}

#[cfg(test)]
struct Rows<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

#[cfg(test)]
impl<T: Versioned> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Rows {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }
}

#[cfg(test)]
impl<T: Versioned> MemoryTable<T> {
    pub fn insert(&self, entity: &mut T) -> Result<(), ModelError> {
        let mut inner = self.inner.lock();
        check_unique(&inner.rows, entity, None)?;
        let id = inner.next_id;
        inner.next_id += 1;
        entity.created(id, OffsetDateTime::now_utc());
        inner.rows.insert(id, entity.clone());
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<T, ModelError> {
        self.inner
            .lock()
            .rows
            .get(&id)
            .cloned()
            .ok_or(ModelError::NotFound)
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.inner
            .lock()
            .rows
            .values()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    /// Version first, uniqueness second: a stale write never reaches the
    /// unique index, same as the conditional `UPDATE`.
    pub fn update(&self, entity: &mut T) -> Result<(), ModelError> {
        let mut inner = self.inner.lock();
        let current = inner
            .rows
            .get(&entity.id())
            .is_some_and(|row| row.version() == entity.version());
        if !current {
            return Err(ModelError::EditConflict);
        }
        check_unique(&inner.rows, entity, Some(entity.id()))?;
        entity.stamp(OffsetDateTime::now_utc(), entity.version() + 1);
        inner.rows.insert(entity.id(), entity.clone());
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<T, ModelError> {
        self.inner
            .lock()
            .rows
            .remove(&id)
            .ok_or(ModelError::NotFound)
    }
}

#[cfg(test)]
fn check_unique<T: Versioned>(
    rows: &BTreeMap<i64, T>,
    entity: &T,
    skip: Option<i64>,
) -> Result<(), ModelError> {
    for (constraint, value) in entity.unique_keys() {
        let taken = rows
            .values()
            .filter(|row| Some(row.id()) != skip)
            .any(|row| row.unique_keys().iter().any(|(c, v)| *c == constraint && *v == value));
        if taken {
            return Err(ModelError::DuplicateKey(constraint.to_string()));
        }
    }
    Ok(())
}
