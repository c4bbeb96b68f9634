use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::{debug, warn};

use crate::{DataError, TreemapError};

/// Key column of every table.
pub const ID_COLUMN: &str = "id";
/// Structure column of the compound table.
pub const SMILES_COLUMN: &str = "smiles";

/// Typed cells of one column. `None` is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// Infer the narrowest type every non-empty cell parses as.
    pub fn infer(cells: Vec<String>) -> Self {
        let present = || cells.iter().map(|cell| cell.trim()).filter(|cell| !cell.is_empty());
        if present().all(|cell| cell.parse::<i64>().is_ok()) {
            ColumnData::Integer(cells.iter().map(|cell| cell.trim().parse().ok()).collect())
        } else if present().all(|cell| cell.parse::<f64>().is_ok()) {
            ColumnData::Float(cells.iter().map(|cell| cell.trim().parse().ok()).collect())
        } else {
            ColumnData::Text(
                cells
                    .into_iter()
                    .map(|cell| if cell.trim().is_empty() { None } else { Some(cell) })
                    .collect(),
            )
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Integer(values) => values.len(),
            ColumnData::Float(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnData::Text(_))
    }

    /// Integer and text columns are rendered with a discrete palette.
    pub fn is_categorical(&self) -> bool {
        !matches!(self, ColumnData::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Integer(_) => "integer",
            ColumnData::Float(_) => "float",
            ColumnData::Text(_) => "text",
        }
    }

    /// The cell as written to CSV; missing values are empty.
    pub fn cell(&self, row: usize) -> String {
        match self {
            ColumnData::Integer(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
            ColumnData::Float(values) => values[row].map(|v| v.to_string()).unwrap_or_default(),
            ColumnData::Text(values) => values[row].clone().unwrap_or_default(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut row = 0;
            values.retain(|_| {
                row += 1;
                keep[row - 1]
            });
        }
        match self {
            ColumnData::Integer(values) => filter(values, keep),
            ColumnData::Float(values) => filter(values, keep),
            ColumnData::Text(values) => filter(values, keep),
        }
    }

    /// Pick rows by index; `None` produces a missing value.
    fn gather(&self, rows: &[Option<usize>]) -> Self {
        match self {
            ColumnData::Integer(values) => {
                ColumnData::Integer(rows.iter().map(|row| row.and_then(|r| values[r])).collect())
            }
            ColumnData::Float(values) => {
                ColumnData::Float(rows.iter().map(|row| row.and_then(|r| values[r])).collect())
            }
            ColumnData::Text(values) => {
                ColumnData::Text(rows.iter().map(|row| row.and_then(|r| values[r].clone())).collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A CSV file split into its key column and the remaining raw columns.
struct KeyedCsv {
    ids: Vec<String>,
    columns: Vec<(String, Vec<String>)>,
}

fn read_keyed_csv(path: &Path) -> Result<KeyedCsv, TreemapError> {
    let file = File::open(path).map_err(TreemapError::io(path))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader.headers().map_err(TreemapError::csv(path))?.clone();

    let id_index = headers
        .iter()
        .position(|header| header == ID_COLUMN)
        .ok_or_else(|| DataError::MissingColumn {
            path: path.to_path_buf(),
            column: ID_COLUMN.to_string(),
        })?;

    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record: StringRecord = record.map_err(TreemapError::csv(path))?;
        let id = record.get(id_index).unwrap_or("").to_string();
        if !seen.insert(id.clone()) {
            return Err(DataError::DuplicateId {
                path: path.to_path_buf(),
                id,
            }
            .into());
        }
        ids.push(id);
        for (column, values) in cells.iter_mut().enumerate() {
            values.push(record.get(column).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .iter()
        .zip(cells)
        .enumerate()
        .filter(|&(index, _)| index != id_index)
        .map(|(_, (name, values))| (name.to_string(), values))
        .collect();
    debug!("read {} rows from {}", ids.len(), path.display());
    Ok(KeyedCsv { ids, columns })
}

/// The compound library: one row per compound, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundTable {
    ids: Vec<String>,
    smiles: Vec<String>,
    columns: Vec<Column>,
}

impl CompoundTable {
    pub fn new(ids: Vec<String>, smiles: Vec<String>) -> Self {
        Self {
            ids,
            smiles,
            columns: Vec::new(),
        }
    }

    /// Read a library CSV with a unique `id` column and a `smiles` column.
    /// Every other column is kept with an inferred type.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, TreemapError> {
        let path = path.as_ref();
        let KeyedCsv { ids, columns } = read_keyed_csv(path)?;

        let mut smiles = None;
        let mut others = Vec::new();
        for (name, values) in columns {
            if name == SMILES_COLUMN && smiles.is_none() {
                smiles = Some(values);
            } else {
                others.push(Column {
                    name,
                    data: ColumnData::infer(values),
                });
            }
        }
        let smiles = smiles.ok_or_else(|| DataError::MissingColumn {
            path: path.to_path_buf(),
            column: SMILES_COLUMN.to_string(),
        })?;

        Ok(Self {
            ids,
            smiles: smiles.into_iter().map(|s| s.trim().to_string()).collect(),
            columns: others,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn smiles(&self) -> &[String] {
        &self.smiles
    }

    /// Columns other than `id` and `smiles`.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_features(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Add a column, replacing any column of the same name in place.
    pub fn add_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<(), TreemapError> {
        let name = name.into();
        if data.len() != self.len() {
            return Err(TreemapError::Config(format!(
                "column '{name}' has {} values for {} rows",
                data.len(),
                self.len()
            )));
        }
        match self.columns.iter_mut().find(|column| column.name == name) {
            Some(column) => column.data = data,
            None => self.columns.push(Column { name, data }),
        }
        Ok(())
    }

    /// Keep the rows whose flag is set.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut row = 0;
        self.ids.retain(|_| {
            row += 1;
            keep[row - 1]
        });
        let mut row = 0;
        self.smiles.retain(|_| {
            row += 1;
            keep[row - 1]
        });
        for column in &mut self.columns {
            column.data.retain(keep);
        }
    }

    /// Left-join the numeric columns of `features` on `id`.
    ///
    /// Rows without a matching feature row get missing values. Non-numeric
    /// columns are dropped with a warning and their names returned. Names
    /// that already exist in this table get a `_feature` suffix.
    pub fn left_join(&mut self, features: &FeatureTable) -> Vec<String> {
        let positions: HashMap<&str, usize> = features
            .ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.as_str(), row))
            .collect();
        let rows: Vec<Option<usize>> = self.ids.iter().map(|id| positions.get(id.as_str()).copied()).collect();

        let unmatched = rows.iter().filter(|row| row.is_none()).count();
        if unmatched > 0 {
            warn!("{unmatched} compounds have no row in {}", features.path.display());
        }

        let mut dropped = Vec::new();
        for column in &features.columns {
            if !column.data.is_numeric() {
                dropped.push(column.name.clone());
                continue;
            }
            let mut name = column.name.clone();
            while name == SMILES_COLUMN || self.column(&name).is_some() {
                name.push_str("_feature");
            }
            self.columns.push(Column {
                name,
                data: column.data.gather(&rows),
            });
        }
        if !dropped.is_empty() {
            warn!(
                "not all additional features are numeric, ignoring non-numeric columns: {}",
                dropped.join(", ")
            );
        }
        dropped
    }

    /// Write the table with the header `id,smiles,<columns...>`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), TreemapError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(TreemapError::io(path))?;
        let mut writer = Writer::from_writer(file);

        let mut header = vec![ID_COLUMN, SMILES_COLUMN];
        header.extend(self.columns.iter().map(|column| column.name.as_str()));
        writer.write_record(&header).map_err(TreemapError::csv(path))?;

        for row in 0..self.len() {
            let mut record = vec![self.ids[row].clone(), self.smiles[row].clone()];
            record.extend(self.columns.iter().map(|column| column.data.cell(row)));
            writer.write_record(&record).map_err(TreemapError::csv(path))?;
        }
        writer.flush().map_err(TreemapError::io(path))?;
        Ok(())
    }
}

/// Extra per-compound values keyed by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    path: PathBuf,
    ids: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureTable {
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, TreemapError> {
        let path = path.as_ref();
        let KeyedCsv { ids, columns } = read_keyed_csv(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            ids,
            columns: columns
                .into_iter()
                .map(|(name, values)| Column {
                    name,
                    data: ColumnData::infer(values),
                })
                .collect(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_column_type_inference() {
        let cells = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        assert_eq!(
            ColumnData::infer(cells(&["1", "", "3"])),
            ColumnData::Integer(vec![Some(1), None, Some(3)])
        );
        assert_eq!(
            ColumnData::infer(cells(&["1", "2.5"])),
            ColumnData::Float(vec![Some(1.0), Some(2.5)])
        );
        let text = ColumnData::infer(cells(&["a", "", "2"]));
        assert_eq!(text, ColumnData::Text(vec![Some("a".into()), None, Some("2".into())]));
        assert!(!text.is_numeric());
        assert!(text.is_categorical());
    }

    #[test]
    fn test_read_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "lib.csv", "smiles,id,activity\nCCO,1,0.5\nCCN,2,\n");
        let table = CompoundTable::read_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.ids(), ["1", "2"]);
        assert_eq!(table.smiles(), ["CCO", "CCN"]);
        assert_eq!(
            table.column("activity").unwrap().data,
            ColumnData::Float(vec![Some(0.5), None])
        );
    }

    #[test]
    fn test_required_columns_and_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let no_smiles = write(dir.path(), "a.csv", "id,structure\n1,CCO\n");
        assert!(matches!(
            CompoundTable::read_csv(&no_smiles),
            Err(TreemapError::Data(DataError::MissingColumn { column, .. })) if column == "smiles"
        ));

        let no_id = write(dir.path(), "b.csv", "name,smiles\nx,CCO\n");
        assert!(matches!(
            CompoundTable::read_csv(&no_id),
            Err(TreemapError::Data(DataError::MissingColumn { column, .. })) if column == "id"
        ));

        let duplicate = write(dir.path(), "c.csv", "id,smiles\n1,CCO\n1,CCN\n");
        assert!(matches!(
            CompoundTable::read_csv(&duplicate),
            Err(TreemapError::Data(DataError::DuplicateId { id, .. })) if id == "1"
        ));

        assert!(matches!(
            CompoundTable::read_csv(dir.path().join("missing.csv")),
            Err(TreemapError::Io { .. })
        ));
    }

    #[test]
    fn test_left_join_keeps_numeric_columns() {
        let dir = tempfile::tempdir().unwrap();
        let library = write(dir.path(), "lib.csv", "id,smiles,score\n1,CCO,3\n2,CCN,4\n3,CCC,5\n");
        let features = write(
            dir.path(),
            "features.csv",
            "id,logp,vendor,score\n2,1.5,acme,10\n1,0.25,globex,20\n",
        );
        let mut table = CompoundTable::read_csv(&library).unwrap();
        let features = FeatureTable::read_csv(&features).unwrap();
        let dropped = table.left_join(&features);

        assert_eq!(dropped, vec!["vendor".to_string()]);
        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["score", "logp", "score_feature"]);
        assert_eq!(
            table.column("logp").unwrap().data,
            ColumnData::Float(vec![Some(0.25), Some(1.5), None])
        );
        assert_eq!(
            table.column("score_feature").unwrap().data,
            ColumnData::Integer(vec![Some(20), Some(10), None])
        );
    }

    #[test]
    fn test_left_join_suffixes_until_unique() {
        let dir = tempfile::tempdir().unwrap();
        let library = write(dir.path(), "lib.csv", "id,smiles,score,score_feature\n1,CCO,3,0.5\n2,CCN,4,0.75\n");
        let features = write(dir.path(), "features.csv", "id,score\n1,30\n2,40\n");
        let mut table = CompoundTable::read_csv(&library).unwrap();
        table.left_join(&FeatureTable::read_csv(&features).unwrap());

        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["score", "score_feature", "score_feature_feature"]);

        let out = dir.path().join("data.csv");
        table.write_csv(&out).unwrap();
        let header = std::fs::read_to_string(&out).unwrap().lines().next().unwrap().to_string();
        assert_eq!(header, "id,smiles,score,score_feature,score_feature_feature");
    }

    #[test]
    fn test_retain_add_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = CompoundTable::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec!["C".into(), "CC".into(), "CCC".into()],
        );
        table.add_column("n", ColumnData::Integer(vec![Some(1), Some(2), Some(3)])).unwrap();
        table.add_column("n", ColumnData::Integer(vec![Some(4), Some(5), Some(6)])).unwrap();
        assert!(table.add_column("bad", ColumnData::Float(vec![None])).is_err());
        table.retain_rows(&[true, false, true]);

        let path = dir.path().join("data.csv");
        table.write_csv(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,smiles,n\na,C,4\nc,CCC,6\n");
    }
}
