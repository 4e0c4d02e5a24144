//! Named-array storage.
//!
//! A storage file is a SQLite database with a single `datasets` table. Each
//! row is one named `f64` array (1-D or 2-D, row-major, little-endian blob).
//! Names use the slash-separated hierarchy of the exchange dumps, e.g.
//! `OB/AskV` or `Trades/Price`.

use std::fs;
use std::path::{Path, PathBuf};

use forecast_core::{Error, Result};
use ndarray::{Array1, Array2};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS datasets (
    name TEXT PRIMARY KEY,
    ndim INTEGER NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB NOT NULL
)";

/// Raw dataset row as stored.
struct RawArray {
    ndim: i64,
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

/// Handle on a named-array storage file.
pub struct ArrayStore {
    conn: Connection,
    path: PathBuf,
}

impl ArrayStore {
    /// Open an existing file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| Error::persistence(&path, e))?;
        Ok(Self { conn, path })
    }

    /// Create a new file, replacing any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Error::persistence(&path, e))?;
        }
        let conn = Connection::open(&path).map_err(|e| Error::persistence(&path, e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::persistence(&path, e))?;
        Ok(Self { conn, path })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All array names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM datasets ORDER BY name")
            .map_err(|e| self.db_err(e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| self.db_err(e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.db_err(e))?;
        Ok(names)
    }

    /// Whether an array with this name exists.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.fetch(name)?.is_some())
    }

    /// Read a 1-D array.
    pub fn read_1d(&self, name: &str) -> Result<Array1<f64>> {
        let raw = self.require(name)?;
        if raw.ndim != 1 {
            return Err(Error::input_shape(format!(
                "{name} in {}: expected 1-D array, found {}-D",
                self.path.display(),
                raw.ndim
            )));
        }
        Ok(Array1::from(raw.values))
    }

    /// Read a 2-D array.
    pub fn read_2d(&self, name: &str) -> Result<Array2<f64>> {
        let raw = self.require(name)?;
        if raw.ndim != 2 {
            return Err(Error::input_shape(format!(
                "{name} in {}: expected 2-D array, found {}-D",
                self.path.display(),
                raw.ndim
            )));
        }
        Array2::from_shape_vec((raw.rows, raw.cols), raw.values)
            .map_err(|e| Error::input_shape(format!("{name}: {e}")))
    }

    /// Write (or replace) a 1-D array.
    pub fn write_1d(&self, name: &str, values: &Array1<f64>) -> Result<()> {
        self.insert(name, 1, values.len(), 1, values.iter().copied())
    }

    /// Write (or replace) a 2-D array.
    pub fn write_2d(&self, name: &str, values: &Array2<f64>) -> Result<()> {
        // `iter` walks in logical row-major order regardless of memory layout.
        self.insert(name, 2, values.nrows(), values.ncols(), values.iter().copied())
    }

    fn insert(
        &self,
        name: &str,
        ndim: i64,
        rows: usize,
        cols: usize,
        values: impl Iterator<Item = f64>,
    ) -> Result<()> {
        let blob: Vec<u8> = values.flat_map(f64::to_le_bytes).collect();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO datasets (name, ndim, rows, cols, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, ndim, rows as i64, cols as i64, blob],
            )
            .map_err(|e| self.db_err(e))?;
        debug!(array = name, rows, cols, path = %self.path.display(), "wrote array");
        Ok(())
    }

    fn require(&self, name: &str) -> Result<RawArray> {
        self.fetch(name)?.ok_or_else(|| {
            Error::input_shape(format!(
                "missing array {name} in {}",
                self.path.display()
            ))
        })
    }

    fn fetch(&self, name: &str) -> Result<Option<RawArray>> {
        let row = self
            .conn
            .query_row(
                "SELECT ndim, rows, cols, data FROM datasets WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| self.db_err(e))?;

        let Some((ndim, rows, cols, blob)) = row else {
            return Ok(None);
        };

        let (rows, cols) = match (usize::try_from(rows), usize::try_from(cols)) {
            (Ok(r), Ok(c)) => (r, c),
            _ => {
                return Err(Error::input_shape(format!(
                    "{name}: negative dimensions {rows}x{cols}"
                )))
            }
        };
        let expected = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(8))
            .ok_or_else(|| {
                Error::input_shape(format!("{name}: dimensions {rows}x{cols} overflow"))
            })?;
        if blob.len() != expected {
            return Err(Error::input_shape(format!(
                "{name}: {} bytes of data for a {rows}x{cols} array",
                blob.len()
            )));
        }

        let values = blob
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_le_bytes(bytes)
            })
            .collect();

        Ok(Some(RawArray {
            ndim,
            rows,
            cols,
            values,
        }))
    }

    fn db_err(&self, err: rusqlite::Error) -> Error {
        Error::persistence(&self.path, err)
    }
}
