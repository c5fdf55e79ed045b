//! SQL schema parsing: extracts `CREATE TABLE` and `CREATE INDEX`
//! statements from a schema file. This is intentionally a shallow parser,
//! enough to make tables, columns and indexes searchable; it is not a SQL
//! validator.

use std::sync::OnceLock;

use regex::Regex;

use crate::records::{Column, SqlIndex, Table};

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)\s*\((.*?)\);",
        )
        .unwrap()
    })
}

fn index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)CREATE\s+(UNIQUE\s+)?INDEX\s+(\w+)\s+ON\s+(\w+)\s*\((.*?)\)")
            .unwrap()
    })
}

fn default_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DEFAULT\s+([^,\s]+)").unwrap())
}

/// Parse every CREATE TABLE statement in the given SQL text, attaching the
/// CREATE INDEX statements that reference each table.
pub fn parse_schema(sql: &str) -> Vec<Table> {
    let mut tables = Vec::new();

    for caps in table_re().captures_iter(sql) {
        let name = caps[1].to_string();
        let indexes = parse_indexes(sql, &name);
        tables.push(Table {
            columns: parse_columns(&caps[2]),
            indexes,
            name,
            description: String::new(),
        });
    }

    tables
}

const CONSTRAINT_PREFIXES: &[&str] = &[
    "PRIMARY KEY",
    "FOREIGN KEY",
    "UNIQUE",
    "INDEX",
    "KEY",
    "CONSTRAINT",
    "CHECK",
];

fn parse_columns(definition: &str) -> Vec<Column> {
    let mut columns = Vec::new();

    // Naive comma split; nested parens in e.g. DECIMAL(10,2) split the type
    // suffix off, which only loses precision detail, never the column.
    for part in definition.split(',') {
        let line = part.trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();
        if CONSTRAINT_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(name), Some(col_type)) = (fields.next(), fields.next())
        else {
            continue;
        };

        let default_value = default_re()
            .captures(line)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        columns.push(Column {
            name: name.to_string(),
            col_type: col_type.to_string(),
            nullable: !upper.contains("NOT NULL"),
            default_value,
        });
    }

    columns
}

fn parse_indexes(sql: &str, table_name: &str) -> Vec<SqlIndex> {
    index_re()
        .captures_iter(sql)
        .filter(|caps| caps[3].eq_ignore_ascii_case(table_name))
        .map(|caps| SqlIndex {
            name: caps[2].to_string(),
            unique: caps
                .get(1)
                .is_some_and(|m| m.as_str().trim().eq_ignore_ascii_case("UNIQUE")),
            columns: caps[4]
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER NOT NULL,
    email VARCHAR(255) NOT NULL,
    name VARCHAR(100),
    created_at TIMESTAMP DEFAULT now(),
    PRIMARY KEY (id)
);

CREATE TABLE sessions (
    id INTEGER NOT NULL,
    user_id INTEGER NOT NULL
);

CREATE UNIQUE INDEX idx_users_email ON users (email);
CREATE INDEX idx_sessions_user ON sessions (user_id, id);
"#;

    #[test]
    fn parses_two_tables() {
        let tables = parse_schema(SCHEMA);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "users");
        assert_eq!(tables[1].name, "sessions");
    }

    #[test]
    fn parses_columns_with_nullability_and_default() {
        let tables = parse_schema(SCHEMA);
        let users = &tables[0];
        assert_eq!(users.columns.len(), 4);

        let id = &users.columns[0];
        assert_eq!(id.name, "id");
        assert_eq!(id.col_type, "INTEGER");
        assert!(!id.nullable);

        let name = &users.columns[2];
        assert!(name.nullable);

        let created = &users.columns[3];
        assert_eq!(created.default_value, "now()");
    }

    #[test]
    fn attaches_indexes_to_their_table() {
        let tables = parse_schema(SCHEMA);
        assert_eq!(tables[0].indexes.len(), 1);
        assert!(tables[0].indexes[0].unique);
        assert_eq!(tables[0].indexes[0].columns, vec!["email"]);

        assert_eq!(tables[1].indexes.len(), 1);
        assert!(!tables[1].indexes[0].unique);
        assert_eq!(
            tables[1].indexes[0].columns,
            vec!["user_id".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn skips_constraint_lines() {
        let tables = parse_schema(SCHEMA);
        assert!(
            tables[0]
                .columns
                .iter()
                .all(|c| !c.name.eq_ignore_ascii_case("primary"))
        );
    }

    #[test]
    fn if_not_exists_variant() {
        let tables = parse_schema(
            "CREATE TABLE IF NOT EXISTS logs (id INTEGER NOT NULL);",
        );
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "logs");
    }

    #[test]
    fn empty_input_yields_no_tables() {
        assert!(parse_schema("").is_empty());
        assert!(parse_schema("-- just a comment\n").is_empty());
    }
}
