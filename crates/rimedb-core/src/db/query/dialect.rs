use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Dialect
///
/// Backend family a command is assembled for. Relational dialects produce
/// SQL text with positional placeholders; `Document` produces a structured
/// operation whose literals reference the parameter list by index.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[remain::sorted]
pub enum Dialect {
    Document,
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    #[must_use]
    pub const fn is_relational(self) -> bool {
        !matches!(self, Self::Document)
    }

    /// Whether writes can hand back the affected rows in the same command.
    #[must_use]
    pub const fn supports_returning(self) -> bool {
        !matches!(self, Self::MySql)
    }

    #[must_use]
    pub fn quote_ident(self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{ident}`"),
            _ => format!("\"{ident}\""),
        }
    }

    /// Dialect spelling for "no row limit" when only OFFSET is wanted.
    #[must_use]
    pub const fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some("-1"),
            Self::MySql => Some("18446744073709551615"),
            Self::Postgres | Self::Document => None,
        }
    }

    /// Rewrite `?` placeholders into the dialect's native form.
    ///
    /// Only valid on text produced by the assembler, where every `?` is a
    /// placeholder: identifiers are validated and literals never inlined.
    #[must_use]
    pub fn number_placeholders(self, sql: &str) -> String {
        if self != Self::Postgres {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut position = 0usize;
        for ch in sql.chars() {
            if ch == '?' {
                position += 1;
                out.push('$');
                out.push_str(&position.to_string());
            } else {
                out.push(ch);
            }
        }

        out
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Document => "document",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        };
        write!(f, "{label}")
    }
}
