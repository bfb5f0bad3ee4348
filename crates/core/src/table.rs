//! Spreadsheet loading.
//!
//! `.csv` files go through the `csv` crate; anything else is treated as a
//! workbook and opened with `calamine` (first sheet only).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{CoreError, CoreResult};

/// Text values treated as missing in CSV input.
const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#NA", "N/A", "NA", "n/a", "<NA>", "NULL", "null", "NaN", "nan", "-NaN", "-nan",
];

static EMPTY: Cell = Cell::Empty;

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    /// `true` for missing values (including float NaN).
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    fn from_csv_field(raw: &str) -> Self {
        if NA_MARKERS.contains(&raw.trim()) {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    fn from_workbook(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            // xlsx stores every number as a double; whole ones read back as ints.
            Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Cell::Int(*f as i64)
            }
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Whole floats keep one decimal (`5.0`). Workbook integers arrive as
/// [`Cell::Int`] and print without one. Booleans are capitalized.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(true) => f.write_str("True"),
            Cell::Bool(false) => f.write_str("False"),
        }
    }
}

/// A loaded sheet: named columns over rows of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a DataTable,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    /// Value of `column`, or `None` if the table has no such column.
    /// Short rows read as [`Cell::Empty`].
    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        let idx = *self.table.index.get(column)?;
        Some(self.cells.get(idx).unwrap_or(&EMPTY))
    }
}

impl DataTable {
    /// Build a table from column names and rows. Rows are padded with
    /// [`Cell::Empty`] or truncated to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            index,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|cells| Row { table: self, cells })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row { table: self, cells })
    }
}

/// Load a data file, choosing the parser from its extension.
///
/// With `headers_present`, the first record names the columns; otherwise
/// columns are numbered `"0"`, `"1"`, ...
pub fn load_table(path: &Path, headers_present: bool) -> CoreResult<DataTable> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        read_csv(path)?
    } else {
        read_workbook(path)?
    };

    Ok(build_table(records, headers_present))
}

fn read_csv(path: &Path) -> CoreResult<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CoreError::Table(format!("{}: {e}", path.display())))?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| CoreError::Table(format!("{}: {e}", path.display())))?;
        // Blank lines carry no row.
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        records.push(record.iter().map(Cell::from_csv_field).collect());
    }
    Ok(records)
}

fn read_workbook(path: &Path) -> CoreResult<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| CoreError::Table(format!("{}: {e}", path.display())))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| CoreError::Table(format!("{}: {e}", path.display())))?,
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from_workbook).collect())
        .collect())
}

fn build_table(mut records: Vec<Vec<Cell>>, headers_present: bool) -> DataTable {
    let width = records.iter().map(Vec::len).max().unwrap_or(0);

    let columns = if headers_present && !records.is_empty() {
        let header = records.remove(0);
        header_names(&header, width)
    } else {
        (0..width).map(|i| i.to_string()).collect()
    };

    DataTable::new(columns, records)
}

/// Turn a header record into unique column names.
///
/// Blank headers become `Unnamed: {i}`; repeated names get `.1`, `.2`, ...
fn header_names(header: &[Cell], width: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..width {
        let base = match header.get(i) {
            Some(cell) if !cell.is_empty() => cell.to_string(),
            _ => format!("Unnamed: {i}"),
        };

        let mut name = base.clone();
        let mut suffix = seen.get(&base).copied().unwrap_or(0);
        while seen.contains_key(&name) {
            suffix += 1;
            name = format!("{base}.{suffix}");
        }
        if name != base {
            seen.insert(base, suffix);
        }
        seen.insert(name.clone(), 0);
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_with_headers() {
        let file = write_csv("name,id\nAlice,1\nBob,2\n");
        let table = load_table(file.path(), true).unwrap();

        assert_eq!(table.columns(), ["name", "id"]);
        assert_eq!(table.len(), 2);
        let row = table.row(1).unwrap();
        assert_eq!(row.get("name"), Some(&Cell::Text("Bob".into())));
        assert_eq!(row.get("id"), Some(&Cell::Text("2".into())));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn csv_without_headers_numbers_columns() {
        let file = write_csv("Alice,1\nBob,2\n");
        let table = load_table(file.path(), false).unwrap();

        assert_eq!(table.columns(), ["0", "1"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.row(0).unwrap().get("0"),
            Some(&Cell::Text("Alice".into()))
        );
    }

    #[test]
    fn empty_and_na_cells_are_missing() {
        let file = write_csv("name,id\n,1\nNA,2\nCarol,\n");
        let table = load_table(file.path(), true).unwrap();

        assert!(table.row(0).unwrap().get("name").unwrap().is_empty());
        assert!(table.row(1).unwrap().get("name").unwrap().is_empty());
        assert!(table.row(2).unwrap().get("id").unwrap().is_empty());
    }

    #[test]
    fn short_rows_are_padded_and_blank_lines_skipped() {
        let file = write_csv("a,b,c\n1\n\n2,3,4\n");
        let table = load_table(file.path(), true).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.row(0).unwrap().get("c"), Some(&Cell::Empty));
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let file = write_csv("name,name,,name\nx,y,z,w\n");
        let table = load_table(file.path(), true).unwrap();

        assert_eq!(table.columns(), ["name", "name.1", "Unnamed: 2", "name.2"]);
    }

    #[test]
    fn missing_file_is_a_table_error() {
        let err = load_table(Path::new("/definitely/not/here.csv"), true).unwrap_err();
        assert_matches!(err, CoreError::Table(_));
    }

    #[test]
    fn non_csv_garbage_is_a_table_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"not a workbook").unwrap();
        let err = load_table(file.path(), true).unwrap_err();
        assert_matches!(err, CoreError::Table(_));
    }

    #[test]
    fn workbook_integers_read_without_a_fraction() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(0, 1, "roll").unwrap();
        sheet.write_string(0, 2, "score").unwrap();
        sheet.write_string(1, 0, "Alice").unwrap();
        sheet.write_number(1, 1, 101).unwrap();
        sheet.write_number(1, 2, 87.5).unwrap();
        workbook.save(file.path()).unwrap();

        let table = load_table(file.path(), true).unwrap();
        let row = table.row(0).unwrap();
        assert_eq!(row.get("name"), Some(&Cell::Text("Alice".into())));
        assert_eq!(row.get("roll"), Some(&Cell::Int(101)));
        assert_eq!(row.get("roll").unwrap().to_string(), "101");
        assert_eq!(row.get("score").unwrap().to_string(), "87.5");
    }

    #[test]
    fn cell_display_matches_spreadsheet_conventions() {
        assert_eq!(Cell::Float(5.0).to_string(), "5.0");
        assert_eq!(Cell::Float(2.5).to_string(), "2.5");
        assert_eq!(Cell::Int(7).to_string(), "7");
        assert_eq!(Cell::Bool(true).to_string(), "True");
        assert_eq!(Cell::Text(" x ".into()).to_string(), " x ");
        assert!(Cell::Float(f64::NAN).is_empty());
    }
}
