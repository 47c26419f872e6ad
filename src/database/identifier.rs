//! Relational identifiers derived from file names and header text.
//!
//! Everything that ends up as a schema, table or column name goes through
//! [`normalize`] and is emitted into SQL only by [`quote_identifier`] after
//! [`validate`] has accepted it.
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name of the surrogate key column every target table carries.
pub const SURROGATE_KEY: &str = "id";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("Hardcode regex pattern"));
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("Hardcode regex pattern"));

#[derive(Error, Debug)]
pub enum IdentifierError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier '{0}' may only contain a-z, 0-9 and '_'")]
    Invalid(String),
}

/// Maps arbitrary text to a safe identifier matching `^[a-z0-9_]*$`.
///
/// The text is lower-cased, accents are folded (`Código` -> `codigo`),
/// whitespace runs become a single `_` and every remaining character outside
/// `[a-z0-9_]` is dropped. The result may be empty.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .collect();
    let underscored = WHITESPACE.replace_all(&folded, "_");
    DISALLOWED.replace_all(&underscored, "").into_owned()
}

/// Normalizes header text into distinct column names.
///
/// An empty name becomes `column{n}` (1-based position). A name that is
/// already taken, including the surrogate key, gets the first free suffix
/// `_2`, `_3`, ...
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut taken = HashSet::from([SURROGATE_KEY.to_owned()]);
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let mut name = normalize(header.as_ref());
            if name.is_empty() {
                name = format!("column{}", index + 1);
            }
            if taken.contains(&name) {
                let base = name;
                name = (2..)
                    .map(|suffix| format!("{base}_{suffix}"))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_default();
            }
            taken.insert(name.to_owned());
            name
        })
        .collect()
}

/// Checks `name` against the identifier allow-list.
pub fn validate(name: &str) -> Result<&str, IdentifierError> {
    if name.is_empty() {
        Err(IdentifierError::Empty)
    } else if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(IdentifierError::Invalid(name.to_owned()))
    }
}

/// Quotes an identifier for SQL text, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes `schema.name` after validating both parts.
pub(crate) fn qualified_name(schema: &str, name: &str) -> Result<String, IdentifierError> {
    Ok(format!(
        "{}.{}",
        quote_identifier(validate(schema)?),
        quote_identifier(validate(name)?)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_headers_and_file_names() {
        assert_eq!(normalize("Código"), "codigo");
        assert_eq!(normalize("Nombre Producto"), "nombre_producto");
        assert_eq!(normalize("  Valor   Total (COP) "), "_valor_total_cop_");
        assert_eq!(normalize("Año\t2024"), "ano_2024");
        assert_eq!(normalize("e-mail@host"), "emailhost");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize("ÜBER straße"), "uber_strae");
    }

    #[test]
    fn normalize_is_idempotent_and_safe() {
        for raw in ["Código", "Nombre Producto", "  x  y ", "Ñandú-2", "東京 タワー", "a\u{0301}b", "ID", ""] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "{raw}");
            assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }

    #[test]
    fn resolves_empty_duplicate_and_reserved_names() {
        let columns = resolve_columns(&["Nombre", "", "nombre", "NOMBRE", "Id", "column2", "?"]);
        assert_eq!(
            columns,
            vec!["nombre", "column2", "nombre_2", "nombre_3", "id_2", "column2_2", "column7"]
        );
    }

    #[test]
    fn validates_against_allow_list() {
        assert_eq!(validate("ventas_2024").unwrap(), "ventas_2024");
        assert!(matches!(validate(""), Err(IdentifierError::Empty)));
        assert!(matches!(validate("drop table"), Err(IdentifierError::Invalid(_))));
        assert!(matches!(validate("x\";--"), Err(IdentifierError::Invalid(_))));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("ventas"), "\"ventas\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(qualified_name("main", "ventas").unwrap(), "\"main\".\"ventas\"");
        assert!(qualified_name("main", "").is_err());
    }
}
