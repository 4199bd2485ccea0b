use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

/// Tables and their columns, in the order introspection produced them.
/// Rebuilt on every translation call and never cached.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaDescription {
    tables: Vec<Table>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `(table, column, data_type)` rows. A table keeps the position of
    /// its first row; columns keep row order.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut schema = Self::new();
        for (table, column, data_type) in rows {
            schema.push_column(table, column, data_type);
        }
        schema
    }

    pub fn push_column(&mut self, table: String, column: String, data_type: String) {
        let column = Column {
            name: column,
            data_type,
        };

        match self.index.get(&table) {
            Some(&idx) => self.tables[idx].columns.push(column),
            None => {
                self.index.insert(table.clone(), self.tables.len());
                self.tables.push(Table {
                    name: table,
                    columns: vec![column],
                });
            }
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.index.get(name).map(|&idx| &self.tables[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    /// Flat description used in prompts:
    /// `Table users with columns: id (int), name (text). Table orders with columns: ...`
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Table {} with columns: {}", table.name, columns)
            })
            .collect::<Vec<_>>()
            .join(". ")
    }
}

impl PartialEq for SchemaDescription {
    fn eq(&self, other: &Self) -> bool {
        self.tables == other.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(t: &str, c: &str, d: &str) -> (String, String, String) {
        (t.to_string(), c.to_string(), d.to_string())
    }

    #[test]
    fn test_from_rows_groups_by_table_in_first_seen_order() {
        let schema = SchemaDescription::from_rows(vec![
            row("users", "id", "integer"),
            row("orders", "id", "integer"),
            row("users", "name", "text"),
            row("orders", "user_id", "integer"),
        ]);

        let names: Vec<_> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);

        let users = schema.table("users").unwrap();
        assert_eq!(users.columns[0].name, "id");
        assert_eq!(users.columns[1].name, "name");
        assert_eq!(schema.column_count(), 4);
    }

    #[test]
    fn test_render() {
        let schema = SchemaDescription::from_rows(vec![
            row("users", "id", "int"),
            row("users", "name", "text"),
            row("orders", "total", "numeric"),
        ]);

        assert_eq!(
            schema.render(),
            "Table users with columns: id (int), name (text). Table orders with columns: total (numeric)"
        );
    }

    #[test]
    fn test_render_empty_schema() {
        let schema = SchemaDescription::new();
        assert!(schema.is_empty());
        assert_eq!(schema.render(), "");
    }
}
