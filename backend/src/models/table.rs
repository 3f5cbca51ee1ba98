//! Tabular site data exchanged with the job service as CSV.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::ValidPoint;
use crate::errors::AppError;

/// Column the job service adds to rejected rows.
pub const ERROR_FIELD: &str = "cc:ErrorMessage";

/// A header row plus string cells, in CSV column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RowTable {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowTable {
    /// Parse a CSV document with a header row.
    pub fn from_csv(data: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.trim().as_bytes());

        let fields = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(Self { fields, rows })
    }

    pub fn to_csv(&self) -> Result<String, AppError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.fields)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        into_string(writer)
    }

    fn error_column(&self) -> Option<usize> {
        self.fields.iter().position(|f| f == ERROR_FIELD)
    }

    fn error_len(&self, row: &[String]) -> usize {
        self.error_column()
            .and_then(|idx| row.get(idx))
            .map(|msg| msg.chars().count())
            .unwrap_or(0)
    }

    /// Rows with the longest error message first; ties keep their order.
    pub fn sorted_by_error(mut self) -> Self {
        let lens: Vec<usize> = self.rows.iter().map(|r| self.error_len(r)).collect();
        let mut indexed: Vec<(usize, Vec<String>)> = lens.into_iter().zip(self.rows).collect();
        indexed.sort_by_key(|(len, _)| Reverse(*len));
        self.rows = indexed.into_iter().map(|(_, row)| row).collect();
        self
    }

    /// Keep only rows whose error cell is present and empty, then drop the error column.
    ///
    /// A table without an error column is returned unchanged.
    pub fn without_error_rows(self) -> Self {
        let Some(idx) = self.error_column() else {
            return self;
        };

        let rows = self
            .rows
            .into_iter()
            .filter(|row| row.get(idx).is_some_and(|msg| msg.is_empty()))
            .map(|mut row| {
                row.remove(idx);
                row
            })
            .collect();

        let mut fields = self.fields;
        fields.remove(idx);

        Self { fields, rows }
    }

    pub fn has_errors(&self) -> bool {
        self.rows.iter().any(|row| self.error_len(row) > 0)
    }
}

/// Serialize facility points as the CSV the job service ingests.
pub fn points_to_csv(points: &[ValidPoint]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for point in points {
        writer.serialize(point)?;
    }
    into_string(writer)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String, AppError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REJECTED: &str = "name,lat,long,cc:ErrorMessage\n\
        Clinic A,8.1,-11.5,\n\
        Clinic B,,-11.2,missing latitude\n\
        Clinic C,9.0,abc,bad\n";

    #[test]
    fn test_parse_error_csv() {
        let table = RowTable::from_csv(REJECTED).unwrap();
        assert_eq!(table.fields, vec!["name", "lat", "long", "cc:ErrorMessage"]);
        assert_eq!(table.rows.len(), 3);
        assert!(table.has_errors());
    }

    #[test]
    fn test_sort_by_error_length_desc() {
        let table = RowTable::from_csv(REJECTED).unwrap().sorted_by_error();
        let names: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["Clinic B", "Clinic C", "Clinic A"]);
    }

    #[test]
    fn test_remove_error_rows() {
        let table = RowTable::from_csv(REJECTED).unwrap().without_error_rows();
        assert_eq!(table.fields, vec!["name", "lat", "long"]);
        assert_eq!(table.rows, vec![vec!["Clinic A", "8.1", "-11.5"]]);
        assert!(!table.has_errors());
    }

    #[test]
    fn test_remove_drops_rows_missing_error_cell() {
        let table = RowTable {
            fields: vec!["name".into(), ERROR_FIELD.into()],
            rows: vec![vec!["short".into()], vec!["ok".into(), String::new()]],
        }
        .without_error_rows();
        assert_eq!(table.rows, vec![vec!["ok".to_string()]]);
    }

    #[test]
    fn test_remove_without_error_column_is_noop() {
        let table = RowTable {
            fields: vec!["name".into()],
            rows: vec![vec!["a".into()]],
        };
        assert_eq!(table.clone().without_error_rows(), table);
    }

    #[test]
    fn test_to_csv_quotes_commas() {
        let table = RowTable {
            fields: vec!["name".into(), "lat".into()],
            rows: vec![vec!["Bo, East".into(), "7.9".into()]],
        };
        assert_eq!(table.to_csv().unwrap(), "name,lat\n\"Bo, East\",7.9\n");
    }

    #[test]
    fn test_points_to_csv_columns() {
        let points = vec![ValidPoint {
            lat: 8.1,
            long: -11.5,
            name: Some("Clinic".into()),
            level: Some(4),
            parent_name: None,
            parent_id: Some("p1".into()),
            code: None,
            org_unit_id: "ou1".into(),
        }];
        assert_eq!(
            points_to_csv(&points).unwrap(),
            "lat,long,name,level,parentName,parentId,code,orgUnitId\n8.1,-11.5,Clinic,4,,p1,,ou1\n"
        );
    }
}
