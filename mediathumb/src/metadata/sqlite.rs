//! SQLite-backed metadata store.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::derivative::{
    AssetId, AssetLocation, AssetTable, DerivativeKind, Dimensions, MediaType,
};

use super::query::{Cmp, Column, QueryBuilder};
use super::{
    AssetRecord, LcdCandidate, MetadataError, MetadataStore, ReadyUpdate, ThumbnailReady,
    READY_TIMESTAMP_MIN,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    media_type INTEGER NOT NULL DEFAULT 1,
    capture_time INTEGER NOT NULL DEFAULT 0,
    orientation INTEGER NOT NULL DEFAULT 0,
    location INTEGER NOT NULL DEFAULT 1,
    asset_table TEXT NOT NULL DEFAULT 'photos',
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    lcd_size TEXT,
    thumb_size TEXT,
    lcd_visit_time INTEGER NOT NULL DEFAULT 0,
    thumbnail_ready INTEGER NOT NULL DEFAULT 0,
    thumbnail_visible INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_assets_lcd_visit ON assets (lcd_visit_time, id);
CREATE INDEX IF NOT EXISTS idx_assets_ready ON assets (thumbnail_ready);
";

/// Metadata store over a single SQLite connection.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteMetadataStore {
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|source| MetadataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "Opened metadata database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, MetadataError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set the page cache of this connection, in bytes.
    pub fn set_cache_size(&self, bytes: usize) -> Result<(), MetadataError> {
        let conn = self.conn.lock();
        conn.execute_batch(&cache_size_pragma(bytes))?;
        Ok(())
    }

    /// Insert or replace one asset row.
    pub fn insert(&self, record: &AssetRecord) -> Result<(), MetadataError> {
        let conn = self.conn.lock();
        insert_row(&conn, record)?;
        Ok(())
    }

    /// Insert many rows in one transaction.
    pub fn insert_many(&self, records: &[AssetRecord]) -> Result<usize, MetadataError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for record in records {
            insert_row(&tx, record)?;
        }
        tx.commit()?;
        debug!(count = records.len(), "Inserted asset rows");
        Ok(records.len())
    }

    /// Total number of asset rows.
    pub fn asset_count(&self) -> Result<u64, MetadataError> {
        self.count(QueryBuilder::count())
    }

    /// Number of rows whose derivatives are marked ready.
    pub fn ready_count(&self) -> Result<u64, MetadataError> {
        self.count(QueryBuilder::count().filter(
            Column::ThumbnailReady,
            Cmp::Ge,
            READY_TIMESTAMP_MIN,
        ))
    }

    fn count(&self, query: QueryBuilder) -> Result<u64, MetadataError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(&query.sql(), params_from_iter(query.params()), |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn select_records(&self, query: QueryBuilder) -> Result<Vec<AssetRecord>, MetadataError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query.sql())?;
        let rows = stmt.query_map(params_from_iter(query.params()), row_to_parts)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(parts_to_record(row?)?);
        }
        Ok(records)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, MetadataError> {
        let conn = self.conn.lock();
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_for(&self, asset_id: AssetId, sql: &str, params: &[Value]) -> Result<(), MetadataError> {
        if self.execute(sql, params)? == 0 {
            return Err(MetadataError::NotFound(asset_id));
        }
        Ok(())
    }
}

fn insert_row(conn: &Connection, record: &AssetRecord) -> Result<(), rusqlite::Error> {
    let (width, height) = record
        .dimensions
        .map(|d| (d.width, d.height))
        .unwrap_or((0, 0));
    conn.execute(
        "INSERT OR REPLACE INTO assets (
            id, path, media_type, capture_time, orientation, location, asset_table,
            width, height, lcd_size, thumb_size, lcd_visit_time, thumbnail_ready, thumbnail_visible
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.asset_id,
            record.source_path.to_string_lossy().into_owned(),
            record.media_type.code(),
            record.capture_time,
            record.orientation,
            record.location.code(),
            record.table.name(),
            width,
            height,
            record.lcd_size.map(|d| d.to_column()),
            record.thumb_size.map(|d| d.to_column()),
            record.lcd_visit_time,
            record.thumbnail_ready.to_code(),
            record.thumbnail_visible,
        ],
    )?;
    Ok(())
}

/// Raw column values in [`Column::ALL`] order.
struct RowParts {
    id: i64,
    path: String,
    media_type: i32,
    capture_time: i64,
    orientation: u32,
    location: i32,
    asset_table: String,
    width: u32,
    height: u32,
    lcd_size: Option<String>,
    thumb_size: Option<String>,
    lcd_visit_time: i64,
    thumbnail_ready: i64,
    thumbnail_visible: bool,
}

fn row_to_parts(row: &Row<'_>) -> rusqlite::Result<RowParts> {
    Ok(RowParts {
        id: row.get(0)?,
        path: row.get(1)?,
        media_type: row.get(2)?,
        capture_time: row.get(3)?,
        orientation: row.get(4)?,
        location: row.get(5)?,
        asset_table: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        lcd_size: row.get(9)?,
        thumb_size: row.get(10)?,
        lcd_visit_time: row.get(11)?,
        thumbnail_ready: row.get(12)?,
        thumbnail_visible: row.get(13)?,
    })
}

fn parts_to_record(parts: RowParts) -> Result<AssetRecord, MetadataError> {
    let media_type = MediaType::from_code(parts.media_type).ok_or(MetadataError::InvalidColumn {
        column: "media_type",
        value: parts.media_type.to_string(),
    })?;
    let location = AssetLocation::from_code(parts.location).ok_or(MetadataError::InvalidColumn {
        column: "location",
        value: parts.location.to_string(),
    })?;
    let table = AssetTable::from_name(&parts.asset_table).ok_or_else(|| {
        MetadataError::InvalidColumn {
            column: "asset_table",
            value: parts.asset_table.clone(),
        }
    })?;
    let dimensions = Some(Dimensions::new(parts.width, parts.height)).filter(|d| !d.is_empty());

    Ok(AssetRecord {
        asset_id: parts.id,
        source_path: PathBuf::from(parts.path),
        media_type,
        capture_time: parts.capture_time,
        orientation: parts.orientation,
        location,
        table,
        dimensions,
        lcd_size: parts.lcd_size.as_deref().and_then(Dimensions::parse),
        thumb_size: parts.thumb_size.as_deref().and_then(Dimensions::parse),
        lcd_visit_time: parts.lcd_visit_time,
        thumbnail_ready: ThumbnailReady::from_code(parts.thumbnail_ready),
        thumbnail_visible: parts.thumbnail_visible,
    })
}

impl MetadataStore for SqliteMetadataStore {
    fn record(&self, asset_id: AssetId) -> Result<Option<AssetRecord>, MetadataError> {
        let query = QueryBuilder::select(&Column::ALL).filter(Column::Id, Cmp::Eq, asset_id);
        let conn = self.conn.lock();
        let parts = conn
            .query_row(&query.sql(), params_from_iter(query.params()), row_to_parts)
            .optional()?;
        drop(conn);
        parts.map(parts_to_record).transpose()
    }

    fn lacking(&self, kind: DerivativeKind, limit: usize) -> Result<Vec<AssetRecord>, MetadataError> {
        let base = QueryBuilder::select(&Column::ALL);
        let query = match kind {
            DerivativeKind::Thumb => base.filter_in(
                Column::ThumbnailReady,
                [
                    ThumbnailReady::Later.to_code(),
                    ThumbnailReady::Now.to_code(),
                    ThumbnailReady::Retry.to_code(),
                ],
            ),
            DerivativeKind::Lcd => base
                .filter(Column::LcdVisitTime, Cmp::Eq, 0)
                .filter(Column::Location, Cmp::Ne, AssetLocation::Cloud.code()),
            DerivativeKind::ThumbCompressed | DerivativeKind::MonthTiny | DerivativeKind::YearTiny => {
                base.filter(Column::AssetTable, Cmp::Eq, AssetTable::Photos.name().to_string())
                    .filter(Column::ThumbnailReady, Cmp::Ge, READY_TIMESTAMP_MIN)
                    .filter(Column::ThumbnailVisible, Cmp::Eq, false)
            }
        };
        self.select_records(
            query
                .order_by(Column::CaptureTime, false)
                .order_by(Column::Id, false)
                .limit(limit),
        )
    }

    fn update_lcd(
        &self,
        asset_id: AssetId,
        size: Dimensions,
        visit_time: i64,
    ) -> Result<(), MetadataError> {
        self.execute_for(
            asset_id,
            "UPDATE assets SET lcd_size = ?1, lcd_visit_time = ?2 WHERE id = ?3",
            &[
                Value::Text(size.to_column()),
                Value::Integer(visit_time),
                Value::Integer(asset_id),
            ],
        )
    }

    fn touch_lcd(&self, asset_id: AssetId, now: i64) -> Result<(), MetadataError> {
        // Rows without an LCD keep visit time 0.
        self.execute(
            "UPDATE assets SET lcd_visit_time = ?1 WHERE id = ?2 AND lcd_visit_time != 0",
            &[Value::Integer(now), Value::Integer(asset_id)],
        )?;
        Ok(())
    }

    fn update_thumb_size(&self, asset_id: AssetId, size: Dimensions) -> Result<(), MetadataError> {
        self.execute_for(
            asset_id,
            "UPDATE assets SET thumb_size = ?1 WHERE id = ?2",
            &[Value::Text(size.to_column()), Value::Integer(asset_id)],
        )
    }

    fn mark_derivatives_ready(&self, update: &ReadyUpdate) -> Result<(), MetadataError> {
        let ready = ThumbnailReady::ReadyAt(update.ready_at).to_code();
        let thumb_size: Value = update
            .thumb_size
            .map(|d| Value::Text(d.to_column()))
            .unwrap_or(Value::Null);
        self.execute_for(
            update.asset_id,
            "UPDATE assets SET
                thumbnail_ready = ?1,
                thumb_size = COALESCE(?2, thumb_size),
                thumbnail_visible = CASE WHEN ?3 THEN 1 ELSE thumbnail_visible END
             WHERE id = ?4",
            &[
                Value::Integer(ready),
                thumb_size,
                Value::Integer(update.set_visible as i64),
                Value::Integer(update.asset_id),
            ],
        )
    }

    fn set_ready_state(&self, asset_id: AssetId, state: ThumbnailReady) -> Result<(), MetadataError> {
        self.execute_for(
            asset_id,
            "UPDATE assets SET thumbnail_ready = ?1 WHERE id = ?2",
            &[Value::Integer(state.to_code()), Value::Integer(asset_id)],
        )
    }

    fn reset_lcd(&self, asset_id: AssetId) -> Result<(), MetadataError> {
        self.execute_for(
            asset_id,
            "UPDATE assets SET lcd_size = NULL, lcd_visit_time = 0 WHERE id = ?1",
            &[Value::Integer(asset_id)],
        )
    }

    fn lcd_count(&self) -> Result<u64, MetadataError> {
        self.count(QueryBuilder::count().filter(Column::LcdVisitTime, Cmp::Ne, 0))
    }

    fn count_lcd_by_visit_time(&self, time: i64, before: bool) -> Result<u64, MetadataError> {
        let cmp = if before { Cmp::Lt } else { Cmp::Ge };
        self.count(
            QueryBuilder::count()
                .filter(Column::LcdVisitTime, Cmp::Ne, 0)
                .filter(Column::LcdVisitTime, cmp, time),
        )
    }

    fn aging_candidates(&self, limit: usize) -> Result<Vec<LcdCandidate>, MetadataError> {
        let query = QueryBuilder::select(&[Column::Id, Column::Path, Column::LcdVisitTime])
            .filter(Column::LcdVisitTime, Cmp::Ne, 0)
            .order_by(Column::LcdVisitTime, true)
            .order_by(Column::Id, true)
            .limit(limit);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&query.sql())?;
        let rows = stmt.query_map(params_from_iter(query.params()), |row| {
            Ok(LcdCandidate {
                asset_id: row.get(0)?,
                source_path: PathBuf::from(row.get::<_, String>(1)?),
                lcd_visit_time: row.get(2)?,
            })
        })?;
        let candidates = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }
}

/// `PRAGMA cache_size` takes a negative value in KiB.
pub(crate) fn cache_size_pragma(bytes: usize) -> String {
    format!("PRAGMA cache_size = -{};", (bytes / 1024).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(records: &[AssetRecord]) -> SqliteMetadataStore {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.insert_many(records).unwrap();
        store
    }

    fn record(id: AssetId, capture_time: i64) -> AssetRecord {
        let mut record = AssetRecord::new(id, format!("/media/{}.jpg", id));
        record.capture_time = capture_time;
        record
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut original = record(1, 100);
        original.orientation = 90;
        original.location = AssetLocation::LocalAndCloud;
        original.dimensions = Some(Dimensions::new(4000, 3000));
        original.table = AssetTable::Highlight;
        let store = store_with(&[original.clone()]);

        assert_eq!(store.record(1).unwrap(), Some(original));
        assert_eq!(store.record(2).unwrap(), None);
    }

    #[test]
    fn test_lcd_bookkeeping() {
        let store = store_with(&[record(1, 0), record(2, 0)]);
        assert_eq!(store.lcd_count().unwrap(), 0);

        store.update_lcd(1, Dimensions::new(1280, 1920), 500).unwrap();
        let row = store.record(1).unwrap().unwrap();
        assert_eq!(row.lcd_size, Some(Dimensions::new(1280, 1920)));
        assert!(row.has_lcd());
        assert_eq!(store.lcd_count().unwrap(), 1);

        // Touch only affects rows that hold an LCD
        store.touch_lcd(1, 900).unwrap();
        store.touch_lcd(2, 900).unwrap();
        assert_eq!(store.record(1).unwrap().unwrap().lcd_visit_time, 900);
        assert_eq!(store.record(2).unwrap().unwrap().lcd_visit_time, 0);

        store.reset_lcd(1).unwrap();
        let row = store.record(1).unwrap().unwrap();
        assert_eq!(row.lcd_size, None);
        assert!(!row.has_lcd());
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = store_with(&[]);
        assert!(matches!(
            store.set_ready_state(7, ThumbnailReady::Retry),
            Err(MetadataError::NotFound(7))
        ));
    }

    #[test]
    fn test_mark_ready_sets_visible_only_when_asked() {
        let store = store_with(&[record(1, 0), record(2, 0)]);
        store
            .mark_derivatives_ready(&ReadyUpdate {
                asset_id: 1,
                ready_at: 5_000,
                thumb_size: Some(Dimensions::new(350, 525)),
                set_visible: true,
            })
            .unwrap();
        store
            .mark_derivatives_ready(&ReadyUpdate {
                asset_id: 2,
                ready_at: 6_000,
                thumb_size: None,
                set_visible: false,
            })
            .unwrap();

        let one = store.record(1).unwrap().unwrap();
        assert_eq!(one.thumbnail_ready, ThumbnailReady::ReadyAt(5_000));
        assert_eq!(one.thumb_size, Some(Dimensions::new(350, 525)));
        assert!(one.thumbnail_visible);

        let two = store.record(2).unwrap().unwrap();
        assert!(two.thumbnail_ready.is_ready());
        assert!(!two.thumbnail_visible);
        assert_eq!(store.ready_count().unwrap(), 2);
    }

    #[test]
    fn test_lacking_thumb_newest_first() {
        let mut ready = record(3, 300);
        ready.thumbnail_ready = ThumbnailReady::ReadyAt(10_000);
        let mut retry = record(2, 200);
        retry.thumbnail_ready = ThumbnailReady::Retry;
        let mut generating = record(4, 400);
        generating.thumbnail_ready = ThumbnailReady::Generating;
        let store = store_with(&[record(1, 100), retry, ready, generating]);

        let ids: Vec<AssetId> = store
            .lacking(DerivativeKind::Thumb, 10)
            .unwrap()
            .iter()
            .map(|r| r.asset_id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_lacking_lcd_skips_pure_cloud() {
        let mut cloud = record(2, 200);
        cloud.location = AssetLocation::Cloud;
        let mut with_lcd = record(3, 300);
        with_lcd.lcd_visit_time = 10;
        let store = store_with(&[record(1, 100), cloud, with_lcd]);

        let ids: Vec<AssetId> = store
            .lacking(DerivativeKind::Lcd, 10)
            .unwrap()
            .iter()
            .map(|r| r.asset_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_lacking_compressed_only_ready_photos() {
        let mut ready_photo = record(1, 100);
        ready_photo.thumbnail_ready = ThumbnailReady::ReadyAt(2_000);
        let mut complete_photo = record(2, 200);
        complete_photo.thumbnail_ready = ThumbnailReady::ReadyAt(2_000);
        complete_photo.thumbnail_visible = true;
        let mut highlight = record(3, 300);
        highlight.thumbnail_ready = ThumbnailReady::ReadyAt(2_000);
        highlight.table = AssetTable::Highlight;
        let store = store_with(&[ready_photo, complete_photo, highlight, record(4, 400)]);

        let ids: Vec<AssetId> = store
            .lacking(DerivativeKind::ThumbCompressed, 10)
            .unwrap()
            .iter()
            .map(|r| r.asset_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_aging_candidates_oldest_first_ties_by_id() {
        let mut rows = Vec::new();
        for (id, visit) in [(1, 30), (2, 10), (3, 10), (4, 0), (5, 20)] {
            let mut r = record(id, 0);
            r.lcd_visit_time = visit;
            rows.push(r);
        }
        let store = store_with(&rows);

        let ids: Vec<AssetId> = store
            .aging_candidates(3)
            .unwrap()
            .iter()
            .map(|c| c.asset_id)
            .collect();
        assert_eq!(ids, vec![2, 3, 5]);
        assert_eq!(store.count_lcd_by_visit_time(20, true).unwrap(), 2);
        assert_eq!(store.count_lcd_by_visit_time(20, false).unwrap(), 2);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db").join("meta.db");
        {
            let store = SqliteMetadataStore::open(&path).unwrap();
            store.insert(&record(1, 1)).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }
        let store = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(store.asset_count().unwrap(), 1);
    }
}
