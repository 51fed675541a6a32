use tracing::debug;

use super::{Operation, OperationContext};
use crate::builder::{SqlStatementBuilder, StatementBuilder};
use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::Result;

/// A SELECT against one table or join clause.
///
/// # Example
///
/// ```no_run
/// # use sqlhelper_core::{Connection, CursorExt, Operation, QueryOperation};
/// # fn run(db: &dyn Connection) -> sqlhelper_core::Result<()> {
/// let mut cursor = QueryOperation::new(db)
///     .table("champions")
///     .projection(["id", "name"])
///     .selection("champion_type = ?")
///     .selection_args(["mage"])?
///     .sort("name")
///     .execute_query()?;
/// while cursor.next() {
///     println!("{}", cursor.get_string("name")?);
/// }
/// cursor.close();
/// # Ok(())
/// # }
/// ```
pub struct QueryOperation<'c, B: StatementBuilder = SqlStatementBuilder> {
    connection: &'c dyn Connection,
    builder: B,
    context: OperationContext,
    projection: Option<Vec<String>>,
    group_by: Option<String>,
    having: Option<String>,
    sort: Option<String>,
}

impl<'c> QueryOperation<'c> {
    /// Creates a query using the default [`SqlStatementBuilder`].
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self::with_builder(connection, SqlStatementBuilder)
    }
}

impl<'c, B: StatementBuilder> QueryOperation<'c, B> {
    pub fn with_builder(connection: &'c dyn Connection, builder: B) -> Self {
        Self {
            connection,
            builder,
            context: OperationContext::default(),
            projection: None,
            group_by: None,
            having: None,
            sort: None,
        }
    }

    /// Columns to return; all columns when never set.
    pub fn projection<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    /// Sets the ORDER BY clause body.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Renders the SELECT statement without executing it.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::MissingTableName`](crate::DatabaseError::MissingTableName)
    /// if no table was set.
    pub fn statement(&self) -> Result<String> {
        let table = self.context.table()?;
        let projection: Option<Vec<&str>> = self
            .projection
            .as_ref()
            .map(|columns| columns.iter().map(String::as_str).collect());
        Ok(self.builder.build_select(
            table,
            projection.as_deref(),
            self.context.selection(),
            self.group_by.as_deref(),
            self.having.as_deref(),
            self.sort.as_deref(),
        ))
    }

    /// Executes the query and returns a cursor positioned before the first row.
    ///
    /// Named selection arguments are bound by name; otherwise positional
    /// arguments (possibly none) are bound in order.
    pub fn execute_query(self) -> Result<Box<dyn Cursor>> {
        let sql = self.statement()?;
        let args = self.context.selection_args();
        debug!(sql = %sql, named = args.is_named(), args = args.len(), "Executing query");
        self.connection.execute_query(&sql, args)
    }
}

impl<B: StatementBuilder> Operation for QueryOperation<'_, B> {
    fn context(&self) -> &OperationContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut OperationContext {
        &mut self.context
    }
}
