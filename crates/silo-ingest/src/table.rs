use chrono::{DateTime, Utc};

use crate::config::SourceEnv;

/// Warehouse-facing type of a column.
///
/// Inference is deliberately narrow: a column is BIGINT if every non-null
/// cell parses as an integer, DOUBLE PRECISION if every non-null cell parses
/// as a number, TEXT otherwise. Provenance columns are typed explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Text,
    TimestampTz,
}

impl ColumnType {
    pub const fn pg_type(&self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE PRECISION",
            Self::Text => "TEXT",
            Self::TimestampTz => "TIMESTAMPTZ",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// An in-memory tabular batch: a header plus string cells, `None` for empty.
///
/// Owned exclusively by the run that produced it; provenance columns are
/// attached once, after which the batch goes straight to the loader.
#[derive(Clone, Debug, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Make column names safe for the warehouse: trimmed, spaces become `_`
    /// and `%` becomes `Pct`.
    pub fn sanitize_columns(&mut self) {
        for column in &mut self.columns {
            column.name = sanitize_name(&column.name);
        }
    }

    /// Drop rows where every cell is null (blank lines, trailing separators).
    pub fn drop_null_rows(&mut self) {
        self.rows.retain(|row| row.iter().any(|cell| cell.is_some()));
    }

    /// Re-type each TEXT column from its data.
    pub fn infer_types(&mut self) {
        for (idx, column) in self.columns.iter_mut().enumerate() {
            if column.ty == ColumnType::Text {
                column.ty = infer_column(self.rows.iter().map(|row| row[idx].as_deref()));
            }
        }
    }

    /// Append a constant-valued column to every row.
    pub fn push_constant(&mut self, name: &str, ty: ColumnType, value: Option<String>) {
        self.columns.push(Column {
            name: name.to_string(),
            ty,
        });
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }

    /// Attach the provenance columns every ingested row carries: source
    /// environment, logical file name, raw file timestamp and the ingestion
    /// wall-clock time.
    pub fn attach_provenance(
        &mut self,
        env: SourceEnv,
        file_name: &str,
        file_date_raw: &str,
        rep_date: DateTime<Utc>,
    ) {
        self.push_constant("source_env", ColumnType::Text, Some(env.to_string()));
        self.push_constant("file_name", ColumnType::Text, Some(file_name.to_string()));
        self.push_constant(
            "file_date",
            ColumnType::Text,
            Some(file_date_raw.to_string()),
        );
        self.push_constant(
            "rep_date",
            ColumnType::TimestampTz,
            Some(rep_date.to_rfc3339()),
        );
    }
}

/// Warehouse identifier hygiene for a single column name.
pub fn sanitize_name(name: &str) -> String {
    name.trim().replace(' ', "_").replace('%', "Pct")
}

fn infer_column<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut all_int = true;
    let mut all_num = true;
    let mut seen = false;

    for cell in cells.flatten() {
        seen = true;
        if cell.parse::<i64>().is_err() {
            all_int = false;
        }
        if cell.parse::<f64>().is_err() {
            all_num = false;
            break;
        }
    }

    match (seen, all_int, all_num) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::BigInt,
        (true, false, true) => ColumnType::Double,
        _ => ColumnType::Text,
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
