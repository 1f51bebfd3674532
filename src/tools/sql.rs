//! Database tools: describe the schema and run queries, over MySQL or SQLite.

use std::sync::Arc;

use futures::future::BoxFuture;
use rig::completion::ToolDefinition;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{
    AnyPool, Column, Row,
    any::{AnyPoolOptions, AnyRow, install_default_drivers},
};
use thiserror::Error;
use tracing::{debug, info};

use super::{Tool, ToolError, definition_for, parse_args};

const DEFAULT_SAMPLE_ROWS: usize = 3;

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("Unsupported database scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL. Only the scheme is echoed back on failure.
    pub fn from_url(url: &str) -> Result<Self, SqlError> {
        let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
        match scheme {
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SqlError::UnsupportedScheme(other.to_owned())),
        }
    }

    fn quote(self, identifier: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", identifier.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    const fn tables_query(self) -> &'static str {
        match self {
            Dialect::MySql => {
                "SELECT TABLE_NAME FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
            }
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        }
    }
}

/// A connection pool plus what the tools need to know about the database behind it.
pub struct SqlDatabase {
    pool: AnyPool,
    dialect: Dialect,
    sample_rows: usize,
}

impl SqlDatabase {
    pub async fn connect(url: &str) -> Result<Self, SqlError> {
        let dialect = Dialect::from_url(url)?;
        install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(5).connect(url).await?;
        info!(?dialect, "connected to database");
        Ok(Self::new(pool, dialect))
    }

    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    /// How many example rows [SqlDatabase::table_info] shows per table. Zero turns them off.
    pub fn sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn table_names(&self) -> Result<Vec<String>, SqlError> {
        let rows = sqlx::query(self.dialect.tables_query())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| cell(row, 0)).collect())
    }

    /// The `CREATE TABLE` statement of every table, each followed by a few sample rows.
    pub async fn table_info(&self) -> Result<String, SqlError> {
        let mut sections = Vec::new();
        for table in self.table_names().await? {
            let mut section = self.create_statement(&table).await?;
            if self.sample_rows > 0 {
                let sql = format!(
                    "SELECT * FROM {} LIMIT {}",
                    self.dialect.quote(&table),
                    self.sample_rows
                );
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
                section.push_str(&format!(
                    "\n\n/*\n{} rows from {table} table:\n{}\n*/",
                    self.sample_rows,
                    render_rows(&rows)
                ));
            }
            sections.push(section);
        }
        debug!(tables = sections.len(), "described schema");
        Ok(sections.join("\n\n"))
    }

    async fn create_statement(&self, table: &str) -> Result<String, SqlError> {
        match self.dialect {
            Dialect::Sqlite => {
                let row = sqlx::query("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(cell(&row, 0))
            }
            Dialect::MySql => {
                let sql = format!("SHOW CREATE TABLE {}", self.dialect.quote(table));
                let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
                Ok(cell(&row, 1))
            }
        }
    }

    /// Run a statement and render its rows as a pipe-separated table with a header line.
    pub async fn run(&self, query: &str) -> Result<String, SqlError> {
        debug!(query, "running query");
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        info!(rows = rows.len(), "query done");
        Ok(render_rows(&rows))
    }
}

fn render_rows(rows: &[AnyRow]) -> String {
    let Some(first) = rows.first() else {
        return "No rows returned.".to_owned();
    };
    let header = first
        .columns()
        .iter()
        .map(|column| column.name())
        .collect::<Vec<_>>()
        .join(" | ");
    let lines = rows.iter().map(|row| {
        (0..row.len())
            .map(|index| cell(row, index))
            .collect::<Vec<_>>()
            .join(" | ")
    });
    std::iter::once(header)
        .chain(lines)
        .collect::<Vec<_>>()
        .join("\n")
}

fn cell(row: &AnyRow, index: usize) -> String {
    let text = |value: Option<String>| value.unwrap_or_else(|| "NULL".to_owned());
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return text(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return text(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return text(value);
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return text(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return text(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()));
    }
    "?".to_owned()
}

/// Describes every table, with sample rows.
pub struct GetSchema {
    database: Arc<SqlDatabase>,
}

impl GetSchema {
    pub fn new(database: Arc<SqlDatabase>) -> Self {
        Self { database }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetSchemaArgs {}

impl Tool for GetSchema {
    fn name(&self) -> &'static str {
        "get_schema"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<GetSchemaArgs>(self.name(), "Returns the database schema.")
    }

    // Takes no arguments; whatever the model sends is ignored.
    fn call(&self, _args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let database = Arc::clone(&self.database);
        Box::pin(async move { Ok(database.table_info().await?) })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunQueryArgs {
    /// The SQL query to run.
    pub query: String,
}

pub struct RunQuery {
    database: Arc<SqlDatabase>,
}

impl RunQuery {
    pub fn new(database: Arc<SqlDatabase>) -> Self {
        Self { database }
    }
}

impl Tool for RunQuery {
    fn name(&self) -> &'static str {
        "run_query"
    }

    fn definition(&self) -> ToolDefinition {
        definition_for::<RunQueryArgs>(self.name(), "Runs an SQL query and returns the result.")
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<String, ToolError>> {
        let database = Arc::clone(&self.database);
        let args = parse_args::<RunQueryArgs>(self.name(), args);
        Box::pin(async move { Ok(database.run(&args?.query).await?) })
    }
}
