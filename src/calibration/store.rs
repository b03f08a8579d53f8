use num_enum::IntoPrimitive;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const TABLE: &str = "filters_focuser_position";

/// One row of the store
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub focuser_position: i64,
    pub reference: bool,
    /// Position relative to the reference filter
    pub offset: i64,
    pub in_use: bool,
}

/// How much of a record could be read. The codes are the ones shown in the session log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum ReadStatus {
    Complete = 0,
    Unreadable = 31,
    NoData = 32,
    MissingPosition = 33,
    MissingReference = 34,
    MissingOffset = 35,
    MissingReferenceAndOffset = 36,
}

impl ReadStatus {
    pub fn has_position(&self) -> bool {
        matches!(
            self,
            ReadStatus::Complete
                | ReadStatus::MissingReference
                | ReadStatus::MissingOffset
                | ReadStatus::MissingReferenceAndOffset
        )
    }
}

impl Display for ReadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ReadStatus::Complete => "complete",
            ReadStatus::Unreadable => "store unreadable",
            ReadStatus::NoData => "no data",
            ReadStatus::MissingPosition => "focuser position missing",
            ReadStatus::MissingReference => "reference flag missing",
            ReadStatus::MissingOffset => "offset missing",
            ReadStatus::MissingReferenceAndOffset => "reference flag and offset missing",
        };
        write!(f, "{} ({})", text, u8::from(*self))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CalibrationRead {
    pub status: ReadStatus,
    pub record: CalibrationRecord,
    /// The row had no usage flag; `record.in_use` was defaulted to true
    pub usage_missing: bool,
}

impl CalibrationRead {
    fn empty(status: ReadStatus) -> Self {
        Self {
            status,
            record: CalibrationRecord::default(),
            usage_missing: false,
        }
    }
}

#[derive(Debug, Error)]
#[error("calibration store {path}: {source}")]
pub struct StoreError {
    pub path: String,
    #[source]
    pub source: rusqlite::Error,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite file holding one calibration row per filter. Every call opens and
/// closes its own connection.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, source: rusqlite::Error) -> StoreError {
        StoreError {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Never fails: problems with the file come back as [`ReadStatus::Unreadable`].
    pub fn read(&self, filter: &str) -> CalibrationRead {
        if !self.path.exists() {
            return CalibrationRead::empty(ReadStatus::NoData);
        }

        match self.try_read(filter) {
            Ok(read) => read,
            Err(e) => {
                warn!("{}", e);
                CalibrationRead::empty(ReadStatus::Unreadable)
            }
        }
    }

    fn try_read(&self, filter: &str) -> StoreResult<CalibrationRead> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| self.error(e))?;

        if !table_exists(&conn).map_err(|e| self.error(e))? {
            return Ok(CalibrationRead::empty(ReadStatus::NoData));
        }
        let usage_column = if has_usage_column(&conn).map_err(|e| self.error(e))? {
            "usage_flag"
        } else {
            "NULL"
        };

        let sql = format!(
            "SELECT focuser_position, reference_flag, offset_for_filter, {} FROM {} WHERE filter_name = ?1",
            usage_column, TABLE
        );
        let row = conn
            .query_row(&sql, params![filter], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })
            .optional()
            .map_err(|e| self.error(e))?;

        let Some((position, reference, offset, usage)) = row else {
            return Ok(CalibrationRead::empty(ReadStatus::NoData));
        };
        debug!(
            "{}: position={:?} reference={:?} offset={:?} usage={:?}",
            filter, position, reference, offset, usage
        );

        let status = match (position, reference, offset) {
            (None, _, _) => ReadStatus::MissingPosition,
            (Some(_), None, None) => ReadStatus::MissingReferenceAndOffset,
            (Some(_), None, Some(_)) => ReadStatus::MissingReference,
            (Some(_), Some(_), None) => ReadStatus::MissingOffset,
            (Some(_), Some(_), Some(_)) => ReadStatus::Complete,
        };

        Ok(CalibrationRead {
            status,
            record: CalibrationRecord {
                focuser_position: position.unwrap_or_default(),
                reference: reference.unwrap_or_default() != 0,
                offset: offset.unwrap_or_default(),
                in_use: usage.map_or(true, |u| u != 0),
            },
            usage_missing: usage.is_none(),
        })
    }

    /// Inserts or replaces all four fields of `filter`, creating the table when needed.
    pub fn write(&self, filter: &str, record: &CalibrationRecord) -> StoreResult<()> {
        let conn = Connection::open(&self.path).map_err(|e| self.error(e))?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    filter_name TEXT PRIMARY KEY,
                    focuser_position INTEGER,
                    reference_flag INTEGER,
                    offset_for_filter INTEGER,
                    usage_flag INTEGER
                )",
                TABLE
            ),
            [],
        )
        .map_err(|e| self.error(e))?;

        if !has_usage_column(&conn).map_err(|e| self.error(e))? {
            debug!("Adding usage_flag to {}", self.path.display());
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN usage_flag INTEGER", TABLE),
                [],
            )
            .map_err(|e| self.error(e))?;
        }

        conn.execute(
            &format!(
                "INSERT INTO {} (filter_name, focuser_position, reference_flag, offset_for_filter, usage_flag)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(filter_name) DO UPDATE SET
                    focuser_position = excluded.focuser_position,
                    reference_flag = excluded.reference_flag,
                    offset_for_filter = excluded.offset_for_filter,
                    usage_flag = excluded.usage_flag",
                TABLE
            ),
            params![
                filter,
                record.focuser_position,
                record.reference,
                record.offset,
                record.in_use
            ],
        )
        .map_err(|e| self.error(e))?;

        Ok(())
    }
}

fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![TABLE],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

fn has_usage_column(conn: &Connection) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", TABLE))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == "usage_flag" {
            return Ok(true);
        }
    }
    Ok(false)
}
