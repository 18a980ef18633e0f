//! The compare-and-swap primitive.
//!
//! Every "transition if still in state X" write in the SQLite backend is expressed through [`ConditionalUpdate`]:
//!
//! ```text
//!   UPDATE {table} SET {assignments} WHERE {key} = ? [AND status = {from}] [AND {guards}]
//! ```
//!
//! The write either applies atomically or matches no rows. A miss is reported as `false` / `None`, never as an error,
//! so losing a race is ordinary control flow for the caller.
use log::trace;
use sqlx::{sqlite::SqliteRow, Encode, FromRow, QueryBuilder, Sqlite, SqliteConnection, Type};

use crate::db_types::{IllegalTransition, Lifecycle};

pub struct ConditionalUpdate<'a> {
    table: &'static str,
    builder: QueryBuilder<'a, Sqlite>,
    assignments: usize,
    expected_status: Option<String>,
}

impl<'a> ConditionalUpdate<'a> {
    pub fn table(table: &'static str) -> Self {
        let mut builder = QueryBuilder::new("UPDATE ");
        builder.push(table).push(" SET ");
        Self { table, builder, assignments: 0, expected_status: None }
    }

    /// A status transition on `table`. Illegal transitions are refused before any SQL is built.
    pub fn transition<S>(table: &'static str, from: S, to: S) -> Result<Self, IllegalTransition>
    where S: Lifecycle {
        let to = from.transition(to)?;
        let mut update = Self::table(table).set("status", to.to_string());
        update.expected_status = Some(from.to_string());
        Ok(update)
    }

    pub fn set<T>(mut self, column: &str, value: T) -> Self
    where T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send {
        self.next_assignment();
        self.builder.push(column).push(" = ").push_bind(value);
        self
    }

    /// `column = column + value`
    pub fn increment(mut self, column: &str, value: i64) -> Self {
        self.next_assignment();
        self.builder.push(format!("{column} = {column} + ")).push_bind(value);
        self
    }

    pub fn where_id<T>(self, id: T) -> GuardedUpdate<'a>
    where T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send {
        self.where_eq("id", id)
    }

    pub fn where_eq<T>(mut self, column: &str, value: T) -> GuardedUpdate<'a>
    where T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send {
        self.builder.push(" WHERE ").push(column).push(" = ").push_bind(value);
        if let Some(status) = self.expected_status {
            self.builder.push(" AND status = ").push_bind(status);
        }
        GuardedUpdate { table: self.table, builder: self.builder }
    }

    fn next_assignment(&mut self) {
        if self.assignments > 0 {
            self.builder.push(", ");
        }
        self.assignments += 1;
    }
}

pub struct GuardedUpdate<'a> {
    table: &'static str,
    builder: QueryBuilder<'a, Sqlite>,
}

impl<'a> GuardedUpdate<'a> {
    /// Adds `AND {condition} ?`, e.g. `.and("quota - held - sold >=", 2)`.
    pub fn and<T>(mut self, condition: &str, value: T) -> Self
    where T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send {
        self.builder.push(" AND ").push(condition).push(" ").push_bind(value);
        self
    }

    /// Applies the update, returning whether any row matched.
    pub async fn execute(mut self, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
        trace!("🗃️ Conditional update on {}: {}", self.table, self.builder.sql());
        let result = self.builder.build().execute(conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Applies the update and returns the updated row, or `None` if the precondition did not hold.
    ///
    /// The statement is always stepped to completion. A `RETURNING` statement abandoned after its first row keeps its
    /// write open on the connection.
    pub async fn fetch_one<T>(self, conn: &mut SqliteConnection) -> Result<Option<T>, sqlx::Error>
    where T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
        let mut rows = self.fetch_all(conn).await?;
        Ok(rows.pop())
    }

    /// Applies the update and returns every row it changed.
    pub async fn fetch_all<T>(mut self, conn: &mut SqliteConnection) -> Result<Vec<T>, sqlx::Error>
    where T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
        self.builder.push(" RETURNING *");
        trace!("🗃️ Conditional update on {}: {}", self.table, self.builder.sql());
        self.builder.build_query_as::<T>().fetch_all(conn).await
    }
}
