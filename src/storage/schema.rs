//! Raw extraction database schema
//!
//! These are the tables the compiler plugin fills while the tree builds.
//! revgraph only reads them; the DDL is kept here so fixtures and tools can
//! create an empty database with the exact same shape.

/// SQL to create the definitions table
pub const CREATE_DEFINITIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS definitions (
    FILENAME CHAR(256),
    FUNNAME TEXT,
    BEGIN INTEGER,
    END INTEGER,
    UNIQUE(FILENAME, FUNNAME, BEGIN, END)
)
"#;

/// SQL to create the declarations table
/// DEF is NULL when the plugin could not see the definition
pub const CREATE_DECLARATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS declarations (
    FILENAME CHAR(256),
    FUNNAME TEXT,
    BEGIN INTEGER,
    END INTEGER,
    DEF INTEGER,
    FOREIGN KEY(DEF) REFERENCES definitions(ROWID),
    UNIQUE(FILENAME, FUNNAME, BEGIN, END)
)
"#;

/// SQL to create the callgraph_resolved table (callee is a definition)
pub const CREATE_CALLGRAPH_RESOLVED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS callgraph_resolved (
    CALLER INTEGER,
    CALLEE INTEGER,
    LINE INTEGER,
    COL INTEGER,
    VIRTUAL BOOLEAN,
    FOREIGN KEY(CALLER) REFERENCES definitions(ROWID),
    FOREIGN KEY(CALLEE) REFERENCES definitions(ROWID),
    UNIQUE(CALLER, CALLEE, LINE, COL, VIRTUAL)
)
"#;

/// SQL to create the callgraph_unresolved table (callee is a declaration)
pub const CREATE_CALLGRAPH_UNRESOLVED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS callgraph_unresolved (
    CALLER INTEGER,
    CALLEE INTEGER,
    LINE INTEGER,
    COL INTEGER,
    VIRTUAL BOOLEAN,
    FOREIGN KEY(CALLER) REFERENCES definitions(ROWID),
    FOREIGN KEY(CALLEE) REFERENCES declarations(ROWID),
    UNIQUE(CALLER, CALLEE, LINE, COL, VIRTUAL)
)
"#;

/// SQL to create the overrides_resolved table
pub const CREATE_OVERRIDES_RESOLVED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS overrides_resolved (
    DEF INTEGER,
    VDEF INTEGER,
    FOREIGN KEY(DEF) REFERENCES definitions(ROWID),
    FOREIGN KEY(VDEF) REFERENCES definitions(ROWID),
    UNIQUE(DEF, VDEF)
)
"#;

/// SQL to create the overrides_unresolved table
pub const CREATE_OVERRIDES_UNRESOLVED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS overrides_unresolved (
    DEF INTEGER,
    VDEC INTEGER,
    FOREIGN KEY(DEF) REFERENCES definitions(ROWID),
    FOREIGN KEY(VDEC) REFERENCES declarations(ROWID),
    UNIQUE(DEF, VDEC)
)
"#;

pub const SELECT_DEFINITIONS: &str =
    "SELECT ROWID, FILENAME, FUNNAME, BEGIN, END FROM definitions ORDER BY ROWID";

pub const SELECT_DECLARATIONS: &str =
    "SELECT ROWID, FILENAME, FUNNAME, BEGIN, END, DEF FROM declarations ORDER BY ROWID";

pub const SELECT_CALLGRAPH_RESOLVED: &str =
    "SELECT CALLER, CALLEE, LINE, COL, VIRTUAL FROM callgraph_resolved ORDER BY ROWID";

pub const SELECT_CALLGRAPH_UNRESOLVED: &str =
    "SELECT CALLER, CALLEE, LINE, COL, VIRTUAL FROM callgraph_unresolved ORDER BY ROWID";

pub const SELECT_OVERRIDES_RESOLVED: &str =
    "SELECT DEF, VDEF FROM overrides_resolved ORDER BY ROWID";

pub const SELECT_OVERRIDES_UNRESOLVED: &str =
    "SELECT DEF, VDEC FROM overrides_unresolved ORDER BY ROWID";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_DEFINITIONS_TABLE,
        CREATE_DECLARATIONS_TABLE,
        CREATE_CALLGRAPH_RESOLVED_TABLE,
        CREATE_CALLGRAPH_UNRESOLVED_TABLE,
        CREATE_OVERRIDES_RESOLVED_TABLE,
        CREATE_OVERRIDES_UNRESOLVED_TABLE,
    ]
}
