/*!
 * Tabular file input and output.
 *
 * Reads a spreadsheet (`.xlsx`, `.xlsm`, `.xls`, `.ods`, first sheet only) or a
 * delimited text file (`.csv`, `.tsv`) into a `Table`, and writes translated
 * tables back out as a multi-sheet workbook or as CSV files.
 */

use bytes::Bytes;
use calamine::{Data, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use log::{debug, info};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use crate::app_config::OutputLayout;
use crate::errors::TableError;
use crate::spreadsheet::{CellValue, Table};
use crate::translation::orchestrator::RunOutcome;

/// Supported tabular file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Office Open XML workbook (also `.xlsm`)
    Xlsx,
    /// Legacy Excel workbook
    Xls,
    /// OpenDocument spreadsheet
    Ods,
    /// Comma separated values
    Csv,
    /// Tab separated values
    Tsv,
}

impl TableFormat {
    /// Detect the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" => Ok(Self::Xlsx),
            "xls" => Ok(Self::Xls),
            "ods" => Ok(Self::Ods),
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            _ => Err(TableError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Whether the format is a delimited text format
    pub fn is_delimited(&self) -> bool {
        matches!(self, Self::Csv | Self::Tsv)
    }

    fn delimiter(&self) -> u8 {
        match self {
            Self::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Where a table is loaded from
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A file on disk; the format comes from its extension
    Path(PathBuf),
    /// An in-memory upload with a declared format
    Bytes {
        /// Raw file content
        data: Bytes,
        /// Declared format of the content
        format: TableFormat,
    },
}

impl From<PathBuf> for TableSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for TableSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Parent directory of an output file if needed
    pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<(), TableError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Load a table from a path or an in-memory buffer
    pub fn load_table(source: &TableSource) -> Result<Table, TableError> {
        let table = match source {
            TableSource::Path(path) => {
                let format = TableFormat::from_path(path)?;
                debug!("Loading {:?} as {:?}", path, format);
                if format.is_delimited() {
                    let file = fs::File::open(path)?;
                    read_delimited(file, format)?
                } else {
                    let mut workbook = open_workbook_auto(path)?;
                    first_sheet(&mut workbook, &path.display().to_string())?
                }
            }
            TableSource::Bytes { data, format } => {
                debug!("Loading {} byte(s) as {:?}", data.len(), format);
                if format.is_delimited() {
                    read_delimited(data.as_ref(), *format)?
                } else {
                    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))?;
                    first_sheet(&mut workbook, "uploaded workbook")?
                }
            }
        };

        info!(
            "Loaded table with {} row(s) and {} column(s)",
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    /// Write a run outcome to disk and return the written files.
    ///
    /// An `.xlsx` destination gets one sheet per language in outcome order
    /// (sheets layout) or a single sheet (wide layout). A `.csv`/`.tsv`
    /// destination gets one file per language named `<stem>_<CODE>.<ext>`
    /// (sheets layout) or the single destination file (wide layout).
    pub fn save_outcome<P: AsRef<Path>>(
        outcome: &RunOutcome,
        destination: P,
        layout: OutputLayout,
    ) -> Result<Vec<PathBuf>, TableError> {
        let destination = destination.as_ref();
        let format = TableFormat::from_path(destination)?;
        Self::ensure_parent_dir(destination)?;

        let sheets: Vec<(String, Table)> = match layout {
            OutputLayout::Sheets => outcome
                .tables()
                .iter()
                .map(|(lang, table)| (lang.code().to_string(), table.clone()))
                .collect(),
            OutputLayout::Wide => vec![("Translations".to_string(), outcome.to_wide_table())],
        };

        match format {
            TableFormat::Xlsx => {
                write_workbook(&sheets, destination)?;
                Ok(vec![destination.to_path_buf()])
            }
            TableFormat::Csv | TableFormat::Tsv => {
                let mut written = Vec::with_capacity(sheets.len());
                if let [(_, table)] = sheets.as_slice() {
                    if layout == OutputLayout::Wide {
                        write_delimited(table, destination, format)?;
                        return Ok(vec![destination.to_path_buf()]);
                    }
                }
                for (name, table) in &sheets {
                    let path = Self::generate_output_path(destination, name);
                    write_delimited(table, &path, format)?;
                    written.push(path);
                }
                Ok(written)
            }
            other => Err(TableError::UnsupportedFormat(format!(
                "{:?} cannot be written, use .xlsx or .csv",
                other
            ))),
        }
    }

    // @generates: Per-language sibling path, e.g. out.csv -> out_EN.csv
    pub fn generate_output_path<P: AsRef<Path>>(destination: P, suffix: &str) -> PathBuf {
        let destination = destination.as_ref();
        let stem = destination.file_stem().unwrap_or_default().to_string_lossy();

        let mut file_name = format!("{}_{}", stem, suffix);
        if let Some(ext) = destination.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }

        destination.with_file_name(file_name)
    }
}

fn read_delimited<R: Read>(reader: R, format: TableFormat) -> Result<Table, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter())
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, header)| {
            if i == 0 {
                header.trim_start_matches('\u{feff}').to_string()
            } else {
                header.to_string()
            }
        })
        .collect();

    if columns.is_empty() {
        return Err(TableError::MissingHeader("delimited input".to_string()));
    }

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(
            record
                .iter()
                .map(|field| if field.is_empty() { None } else { Some(field.to_string()) })
                .collect(),
        );
    }
    Ok(table)
}

fn first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>, label: &str) -> Result<Table, TableError> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TableError::Spreadsheet(format!("{} has no worksheet", label)))?;

    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| TableError::MissingHeader(format!("{} / {}", label, sheet_name)))?;

    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| cell_to_value(cell).unwrap_or_else(|| format!("Unnamed: {}", i)))
        .collect();

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(cell_to_value).collect());
    }
    Ok(table)
}

fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Worksheet coordinates of a data cell; row 0 holds the header
fn sheet_position(row: usize, col: usize) -> Result<(u32, u16), TableError> {
    let sheet_row = u32::try_from(row).map_err(|_| TableError::Write(format!("Row {} is out of range for a worksheet", row)))?;
    let sheet_col =
        u16::try_from(col).map_err(|_| TableError::Write(format!("Column {} is out of range for a worksheet", col)))?;
    Ok((sheet_row, sheet_col))
}

fn write_workbook(sheets: &[(String, Table)], destination: &Path) -> Result<(), TableError> {
    let mut workbook = Workbook::new();

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name.as_str())?;

        for (col, header) in table.columns().iter().enumerate() {
            let (row, col) = sheet_position(0, col)?;
            worksheet.write_string(row, col, header.as_str())?;
        }

        for (row_index, row) in table.rows().iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                if let Some(text) = cell.as_deref().filter(|t| !t.is_empty()) {
                    let (row, col) = sheet_position(row_index + 1, col)?;
                    worksheet.write_string(row, col, text)?;
                }
            }
        }
    }

    workbook.save(destination)?;
    info!("Wrote {} sheet(s) to {:?}", sheets.len(), destination);
    Ok(())
}

fn write_delimited(table: &Table, path: &Path, format: TableFormat) -> Result<(), TableError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_path(path)?;

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    info!("Wrote {} row(s) to {:?}", table.row_count(), path);
    Ok(())
}
