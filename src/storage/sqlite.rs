//! SQLite access to the raw extraction database

use std::path::Path;
use rusqlite::{Connection, OpenFlags, params};
use crate::{Result, RowId};
use super::schema;
use super::{CallRow, DeclarationRow, DefinitionRow, OverrideRow, RawTables};

/// Handle on one revision's raw extraction database
pub struct RawDatabase {
    conn: Connection,
}

impl RawDatabase {
    /// Open an existing database read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Create (or open) a writable database with the extraction schema
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema.
    ///
    /// The link tables reference `definitions(ROWID)`, which is not a declared
    /// key, so foreign-key enforcement stays off as it does for the plugin.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Reading ==========

    /// Load all six tables into memory
    pub fn load_tables(&self) -> Result<RawTables> {
        let tables = RawTables {
            definitions: self.definitions()?,
            declarations: self.declarations()?,
            calls_resolved: self.calls(schema::SELECT_CALLGRAPH_RESOLVED)?,
            calls_unresolved: self.calls(schema::SELECT_CALLGRAPH_UNRESOLVED)?,
            overrides_resolved: self.overrides(schema::SELECT_OVERRIDES_RESOLVED)?,
            overrides_unresolved: self.overrides(schema::SELECT_OVERRIDES_UNRESOLVED)?,
        };
        tracing::debug!(rows = tables.row_count(), "loaded raw tables");
        Ok(tables)
    }

    fn definitions(&self) -> Result<Vec<DefinitionRow>> {
        let mut stmt = self.conn.prepare(schema::SELECT_DEFINITIONS)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DefinitionRow {
                    row_id: row.get(0)?,
                    file_path: row.get(1)?,
                    signature: row.get(2)?,
                    begin: row.get(3)?,
                    end: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn declarations(&self) -> Result<Vec<DeclarationRow>> {
        let mut stmt = self.conn.prepare(schema::SELECT_DECLARATIONS)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeclarationRow {
                    row_id: row.get(0)?,
                    file_path: row.get(1)?,
                    signature: row.get(2)?,
                    begin: row.get(3)?,
                    end: row.get(4)?,
                    definition: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn calls(&self, sql: &str) -> Result<Vec<CallRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CallRow {
                    caller: row.get(0)?,
                    callee: row.get(1)?,
                    line: row.get(2)?,
                    col: row.get(3)?,
                    is_virtual: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn overrides(&self, sql: &str) -> Result<Vec<OverrideRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OverrideRow {
                    base: row.get(0)?,
                    other: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ========== Writing (fixtures and tooling) ==========

    /// Insert a definition and return its row id
    pub fn insert_definition(&self, file_path: &str, signature: &str, begin: u32, end: u32) -> Result<RowId> {
        self.conn.execute(
            "INSERT INTO definitions (FILENAME, FUNNAME, BEGIN, END) VALUES (?1, ?2, ?3, ?4)",
            params![file_path, signature, begin, end],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a declaration and return its row id
    pub fn insert_declaration(
        &self,
        file_path: &str,
        signature: &str,
        begin: u32,
        end: u32,
        definition: Option<RowId>,
    ) -> Result<RowId> {
        self.conn.execute(
            "INSERT INTO declarations (FILENAME, FUNNAME, BEGIN, END, DEF) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![file_path, signature, begin, end, definition],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a call whose callee is a definition
    pub fn insert_call_resolved(&self, caller: RowId, callee: RowId, line: u32, col: u32, is_virtual: bool) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO callgraph_resolved (CALLER, CALLEE, LINE, COL, VIRTUAL) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![caller, callee, line, col, is_virtual],
        )?;
        Ok(())
    }

    /// Insert a call whose callee is a declaration
    pub fn insert_call_unresolved(&self, caller: RowId, callee_decl: RowId, line: u32, col: u32, is_virtual: bool) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO callgraph_unresolved (CALLER, CALLEE, LINE, COL, VIRTUAL) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![caller, callee_decl, line, col, is_virtual],
        )?;
        Ok(())
    }

    /// Insert an override pair between two definitions
    pub fn insert_override_resolved(&self, def: RowId, vdef: RowId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO overrides_resolved (DEF, VDEF) VALUES (?1, ?2)",
            params![def, vdef],
        )?;
        Ok(())
    }

    /// Insert an override pair between a definition and a declaration
    pub fn insert_override_unresolved(&self, def: RowId, vdec: RowId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO overrides_unresolved (DEF, VDEC) VALUES (?1, ?2)",
            params![def, vdec],
        )?;
        Ok(())
    }
}
