//! Schema ownership and the append path.
//!
//! The table is created only by [`provision`]. [`insert_incidents`] refuses
//! to run against a store without it, deduplicates each batch by case
//! number, and skips case numbers the store already holds.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crime_dash_incident_models::{Column, ISO_TIMESTAMP_FORMAT, StoredIncident, parse_any_timestamp};
use duckdb::Connection;

use crate::DbError;

/// The incidents table.
pub const TABLE_NAME: &str = "ChicagoCrimes";

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 2_000;

/// Attempts made to open a store before giving up.
const OPEN_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled for each later one.
const OPEN_BACKOFF: Duration = Duration::from_millis(100);

const CREATE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS "ChicagoCrimes" (
    "ID" BIGINT,
    "CaseNumber" VARCHAR NOT NULL PRIMARY KEY,
    "Date" TIMESTAMP NOT NULL,
    "PrimaryType" VARCHAR,
    "Description" VARCHAR,
    "LocationDescription" VARCHAR,
    "Arrest" INTEGER NOT NULL CHECK ("Arrest" IN (0, 1)),
    "Domestic" INTEGER NOT NULL CHECK ("Domestic" IN (0, 1)),
    "Beat" INTEGER,
    "District" INTEGER,
    "Ward" INTEGER,
    "CommunityArea" INTEGER,
    "FBICode" VARCHAR,
    "Latitude" DOUBLE,
    "Longitude" DOUBLE,
    "Year" INTEGER NOT NULL,
    "Month" INTEGER NOT NULL,
    "Day" INTEGER NOT NULL,
    "Hour" INTEGER NOT NULL,
    "XCoordinate" DOUBLE,
    "YCoordinate" DOUBLE,
    "Location" VARCHAR
)"#;

/// Counters from one [`insert_incidents`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    /// Rows dropped because an earlier row in the batch had the same case
    /// number.
    pub duplicates_in_batch: u64,
    /// Rows added to the store.
    pub inserted: u64,
    /// Rows skipped because the store already held their case number.
    pub skipped_existing: u64,
}

/// Quoted, comma-separated column list in canonical order.
#[must_use]
pub fn column_list() -> String {
    let mut list = String::new();
    for (i, column) in Column::ALL.iter().enumerate() {
        if i > 0 {
            list.push_str(", ");
        }
        let _ = write!(list, "\"{column}\"");
    }
    list
}

fn open_with_retry(
    path: &Path,
    open: impl Fn() -> duckdb::Result<Connection>,
) -> Result<Connection, DbError> {
    let mut attempt = 1;
    loop {
        match open() {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < OPEN_ATTEMPTS => {
                let delay = OPEN_BACKOFF * 2u32.pow(attempt - 1);
                log::warn!(
                    "Opening {} failed (attempt {attempt}/{OPEN_ATTEMPTS}): {e}; retrying in {}ms",
                    path.display(),
                    delay.as_millis(),
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Opens (or creates) a store for writing.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory cannot be created or the
/// store cannot be opened after retrying.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    crate::paths::ensure_parent_dir(path)?;
    open_with_retry(path, || Connection::open(path))
}

/// Opens an existing store read-only.
///
/// # Errors
///
/// Returns [`DbError::MissingStore`] if the file does not exist, or
/// [`DbError::DuckDb`] if it cannot be opened after retrying.
pub fn open_read_only(path: &Path) -> Result<Connection, DbError> {
    if !path.exists() {
        return Err(DbError::MissingStore {
            path: path.to_path_buf(),
        });
    }

    open_with_retry(path, || {
        Connection::open_with_flags(
            path,
            duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?,
        )
    })
}

/// Creates the incidents table, dropping any existing one first when
/// `recreate` is set.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub fn create_table(conn: &Connection, recreate: bool) -> Result<(), DbError> {
    if recreate {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{TABLE_NAME}\""))?;
    }
    conn.execute_batch(CREATE_TABLE)?;
    Ok(())
}

/// Provisions the store at `path`: creates the file and the incidents
/// table. With `recreate`, an existing table and its rows are dropped.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be opened or the DDL fails.
pub fn provision(path: &Path, recreate: bool) -> Result<(), DbError> {
    let conn = open(path)?;
    let existed = table_exists(&conn)?;
    create_table(&conn, recreate)?;

    match (existed, recreate) {
        (true, true) => log::info!("Recreated {TABLE_NAME} in {}", path.display()),
        (true, false) => log::info!("{TABLE_NAME} already exists in {}", path.display()),
        (false, _) => log::info!("Created {TABLE_NAME} in {}", path.display()),
    }

    Ok(())
}

/// Whether the incidents table exists.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn table_exists(conn: &Connection) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
    )?;
    let count: i64 = stmt.query_row([TABLE_NAME], |row| row.get(0))?;
    Ok(count > 0)
}

/// Fails with [`DbError::MissingTable`] unless the incidents table exists.
///
/// # Errors
///
/// Returns [`DbError::MissingTable`] if the table is absent, or
/// [`DbError`] if the catalog query fails.
pub fn require_table(conn: &Connection, path: &Path) -> Result<(), DbError> {
    if table_exists(conn)? {
        Ok(())
    } else {
        Err(DbError::MissingTable {
            path: path.to_path_buf(),
        })
    }
}

/// Returns the number of stored incidents.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn record_count(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM \"{TABLE_NAME}\""))?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

/// Appends incidents in one transaction.
///
/// Within the batch only the first row for each case number is kept; rows
/// whose case number is already stored are skipped (`ON CONFLICT DO
/// NOTHING`). `on_chunk` is called with the size of each chunk after it is
/// written. Either every chunk is committed or none is.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails; the transaction is rolled
/// back.
pub fn insert_incidents(
    conn: &mut Connection,
    incidents: &[StoredIncident],
    mut on_chunk: impl FnMut(u64),
) -> Result<InsertSummary, DbError> {
    let mut seen = BTreeSet::new();
    let deduped: Vec<&StoredIncident> = incidents
        .iter()
        .filter(|incident| seen.insert(incident.case_number.as_str()))
        .collect();
    let duplicates_in_batch = (incidents.len() - deduped.len()) as u64;

    if duplicates_in_batch > 0 {
        log::info!(
            "Deduplicated INSERT batch: {} -> {} rows ({duplicates_in_batch} duplicates removed)",
            incidents.len(),
            deduped.len(),
        );
    }

    if deduped.is_empty() {
        return Ok(InsertSummary {
            duplicates_in_batch,
            ..InsertSummary::default()
        });
    }

    let tx = conn.transaction()?;
    let before = record_count(&tx)?;

    for chunk in deduped.chunks(CHUNK_SIZE) {
        insert_chunk(&tx, chunk)?;
        on_chunk(chunk.len() as u64);
    }

    let after = record_count(&tx)?;
    tx.commit()?;

    let inserted = after.saturating_sub(before);
    let skipped_existing = deduped.len() as u64 - inserted;
    if skipped_existing > 0 {
        log::info!("Skipped {skipped_existing} rows whose case number is already stored");
    }

    Ok(InsertSummary {
        duplicates_in_batch,
        inserted,
        skipped_existing,
    })
}

#[allow(clippy::cast_possible_wrap)]
fn insert_chunk(conn: &Connection, chunk: &[&StoredIncident]) -> Result<(), DbError> {
    let placeholders = format!("({})", vec!["?"; Column::ALL.len()].join(", "));
    let mut sql = format!("INSERT INTO \"{TABLE_NAME}\" ({}) VALUES ", column_list());
    for i in 0..chunk.len() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&placeholders);
    }
    sql.push_str(" ON CONFLICT DO NOTHING");

    let mut stmt = conn.prepare(&sql)?;
    let mut idx = 1usize;

    for incident in chunk {
        let timestamp = incident.occurred_at.format(ISO_TIMESTAMP_FORMAT).to_string();

        stmt.raw_bind_parameter(idx, incident.id)?;
        stmt.raw_bind_parameter(idx + 1, &incident.case_number)?;
        stmt.raw_bind_parameter(idx + 2, &timestamp)?;
        stmt.raw_bind_parameter(idx + 3, incident.primary_type.as_deref())?;
        stmt.raw_bind_parameter(idx + 4, incident.description.as_deref())?;
        stmt.raw_bind_parameter(idx + 5, incident.location_description.as_deref())?;
        stmt.raw_bind_parameter(idx + 6, i32::from(incident.arrest))?;
        stmt.raw_bind_parameter(idx + 7, i32::from(incident.domestic))?;
        stmt.raw_bind_parameter(idx + 8, incident.beat)?;
        stmt.raw_bind_parameter(idx + 9, incident.district)?;
        stmt.raw_bind_parameter(idx + 10, incident.ward)?;
        stmt.raw_bind_parameter(idx + 11, incident.community_area)?;
        stmt.raw_bind_parameter(idx + 12, incident.fbi_code.as_deref())?;
        stmt.raw_bind_parameter(idx + 13, incident.latitude)?;
        stmt.raw_bind_parameter(idx + 14, incident.longitude)?;
        stmt.raw_bind_parameter(idx + 15, incident.year)?;
        stmt.raw_bind_parameter(idx + 16, incident.month as i32)?;
        stmt.raw_bind_parameter(idx + 17, incident.day as i32)?;
        stmt.raw_bind_parameter(idx + 18, incident.hour as i32)?;
        stmt.raw_bind_parameter(idx + 19, incident.x_coordinate)?;
        stmt.raw_bind_parameter(idx + 20, incident.y_coordinate)?;
        stmt.raw_bind_parameter(idx + 21, incident.location.as_deref())?;

        idx += Column::ALL.len();
    }

    stmt.raw_execute()?;
    Ok(())
}

/// Returns up to `limit` stored incidents ordered by case number.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored timestamp cannot be
/// parsed.
pub fn sample_incidents(conn: &Connection, limit: u32) -> Result<Vec<StoredIncident>, DbError> {
    let sql = format!(
        "SELECT \"ID\", \"CaseNumber\", \"Date\"::VARCHAR, \"PrimaryType\", \"Description\",
                \"LocationDescription\", \"Arrest\", \"Domestic\", \"Beat\", \"District\",
                \"Ward\", \"CommunityArea\", \"FBICode\", \"Latitude\", \"Longitude\",
                \"Year\", \"Month\"::UINTEGER, \"Day\"::UINTEGER, \"Hour\"::UINTEGER,
                \"XCoordinate\", \"YCoordinate\", \"Location\"
         FROM \"{TABLE_NAME}\"
         ORDER BY \"CaseNumber\"
         LIMIT ?"
    );

    let mut stmt = conn.prepare(&sql)?;
    stmt.raw_bind_parameter(1, i64::from(limit))?;
    stmt.raw_execute()?;

    let mut incidents = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let timestamp: String = row.get(2)?;
        let occurred_at =
            parse_any_timestamp(&timestamp).ok_or_else(|| DbError::Conversion {
                message: format!("unparseable stored timestamp {timestamp:?}"),
            })?;
        let arrest: i32 = row.get(6)?;
        let domestic: i32 = row.get(7)?;

        incidents.push(StoredIncident {
            id: row.get(0)?,
            case_number: row.get(1)?,
            occurred_at,
            primary_type: row.get(3)?,
            description: row.get(4)?,
            location_description: row.get(5)?,
            arrest: arrest != 0,
            domestic: domestic != 0,
            beat: row.get(8)?,
            district: row.get(9)?,
            ward: row.get(10)?,
            community_area: row.get(11)?,
            fbi_code: row.get(12)?,
            latitude: row.get(13)?,
            longitude: row.get(14)?,
            year: row.get(15)?,
            month: row.get(16)?,
            day: row.get(17)?,
            hour: row.get(18)?,
            x_coordinate: row.get(19)?,
            y_coordinate: row.get(20)?,
            location: row.get(21)?,
        });
    }

    Ok(incidents)
}
