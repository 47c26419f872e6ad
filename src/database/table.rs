use crate::database::identifier::qualified_name;
use crate::database::identifier::quote_identifier;
use crate::database::identifier::validate;
use crate::database::identifier::IdentifierError;
use crate::database::identifier::SURROGATE_KEY;
use crate::error::SheetIngestError;
use duckdb::Connection;

/// A target table: a surrogate key plus one text column per header.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    /// Schema the table lives in
    pub schema: String,
    /// Table name, normalized from the uploaded file name
    pub name: String,
    /// Column names in header order, surrogate key excluded
    pub columns: Vec<String>,
}

impl Table {
    /// Builds a table definition after checking every identifier against the
    /// allow-list. Fails for an empty table name or an empty column set.
    pub fn new(schema: &str, name: &str, columns: Vec<String>) -> Result<Self, IdentifierError> {
        validate(schema)?;
        validate(name)?;
        if columns.is_empty() {
            Err(IdentifierError::Empty)?
        }
        for column in &columns {
            validate(column)?;
        }
        Ok(Self {
            schema: schema.to_owned(),
            name: name.to_owned(),
            columns,
        })
    }

    /// `"schema"."name"`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.name))
    }

    fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.name, SURROGATE_KEY)
    }

    /// Statements that create the key sequence and the table when absent.
    pub(crate) fn create_statements(&self) -> Result<Vec<String>, IdentifierError> {
        let sequence = self.sequence_name();
        let columns = self.columns
            .iter()
            .map(|column| format!("{} TEXT", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(vec![
            format!("CREATE SEQUENCE IF NOT EXISTS {}", qualified_name(&self.schema, &sequence)?),
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({} BIGINT PRIMARY KEY DEFAULT nextval('{}.{}'), {})",
                self.qualified_name(),
                quote_identifier(SURROGATE_KEY),
                self.schema,
                sequence,
                columns,
            ),
        ])
    }

    /// Creates the table if it does not exist. An existing table is left as
    /// it is, whatever its columns.
    pub fn ensure(&self, conn: &Connection) -> Result<(), SheetIngestError> {
        for statement in self.create_statements()? {
            conn.execute_batch(&statement)?;
        }
        Ok(())
    }

    /// Parameterized insert of one value per column.
    pub fn insert_statement(&self) -> String {
        let columns = self.columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!("INSERT INTO {} ({}) VALUES ({})", self.qualified_name(), columns, placeholders)
    }
}
