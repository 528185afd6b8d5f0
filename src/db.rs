use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::induce::{Block, ResultSet};

pub const PENDING: i64 = 0;
pub const VISITED: i64 = 1;
pub const FAILED: i64 = 2;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS result_sets (
            id         INTEGER PRIMARY KEY,
            page_url   TEXT NOT NULL,
            host       TEXT NOT NULL,
            suffixes   TEXT NOT NULL,
            threshold  REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS result_items (
            result_id  INTEGER NOT NULL REFERENCES result_sets(id) ON DELETE CASCADE,
            block_idx  INTEGER NOT NULL,
            item_idx   INTEGER NOT NULL,
            candidate  TEXT NOT NULL,
            PRIMARY KEY (result_id, block_idx, item_idx)
        );

        CREATE TABLE IF NOT EXISTS queue (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            parent_id  INTEGER REFERENCES queue(id),
            status     INTEGER NOT NULL DEFAULT 0,
            error      TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            visited_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_status ON queue(status);
        ",
    )?;
    Ok(())
}

// ── Result sets ──

pub struct StoredResultSet {
    pub id: i64,
    pub page_url: String,
    pub suffixes: Vec<String>,
    pub threshold: f64,
    pub created_at: String,
    pub result: ResultSet,
}

pub struct ResultSetSummary {
    pub id: i64,
    pub page_url: String,
    pub blocks: usize,
    pub items: usize,
    pub created_at: String,
}

/// Persist one clustering pass. Block and item positions are stored
/// explicitly so the order survives the round trip.
pub fn save_result_set(
    conn: &Connection,
    page_url: &str,
    suffixes: &[String],
    threshold: f64,
    result: &ResultSet,
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO result_sets (page_url, host, suffixes, threshold, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            page_url,
            result.host,
            serde_json::to_string(suffixes)?,
            threshold,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    let id = tx.last_insert_rowid();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO result_items (result_id, block_idx, item_idx, candidate)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (b, block) in result.blocks.iter().enumerate() {
            for (i, item) in block.items.iter().enumerate() {
                stmt.execute(rusqlite::params![id, b as i64, i as i64, item])?;
            }
        }
    }
    tx.commit()?;
    Ok(id)
}

/// Load a stored pass by id, or the most recent one.
pub fn load_result_set(conn: &Connection, id: Option<i64>) -> Result<Option<StoredResultSet>> {
    let header = conn
        .query_row(
            "SELECT id, page_url, host, suffixes, threshold, created_at
             FROM result_sets
             WHERE ?1 IS NULL OR id = ?1
             ORDER BY id DESC LIMIT 1",
            [id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((id, page_url, host, suffixes, threshold, created_at)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT block_idx, candidate FROM result_items
         WHERE result_id = ?1 ORDER BY block_idx, item_idx",
    )?;
    let rows = stmt
        .query_map([id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut blocks: Vec<Block> = Vec::new();
    let mut current = None;
    for (block_idx, candidate) in rows {
        if current != Some(block_idx) {
            blocks.push(Block::new(Vec::new()));
            current = Some(block_idx);
        }
        if let Some(block) = blocks.last_mut() {
            block.items.push(candidate);
        }
    }

    Ok(Some(StoredResultSet {
        id,
        page_url,
        suffixes: serde_json::from_str(&suffixes).context("Corrupt suffix list")?,
        threshold,
        created_at,
        result: ResultSet { host, blocks },
    }))
}

pub fn list_result_sets(conn: &Connection) -> Result<Vec<ResultSetSummary>> {
    let mut stmt = conn.prepare(
        "SELECT rs.id, rs.page_url,
                COUNT(DISTINCT ri.block_idx), COUNT(ri.candidate), rs.created_at
         FROM result_sets rs
         LEFT JOIN result_items ri ON ri.result_id = rs.id
         GROUP BY rs.id
         ORDER BY rs.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ResultSetSummary {
                id: row.get(0)?,
                page_url: row.get(1)?,
                blocks: row.get::<_, i64>(2)? as usize,
                items: row.get::<_, i64>(3)? as usize,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Crawl queue ──

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub url: String,
}

pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub visited: usize,
    pub failed: usize,
}

/// Add URLs not seen before; returns how many were new.
pub fn enqueue(conn: &Connection, urls: &[String], parent: Option<i64>) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO queue (url, parent_id) VALUES (?1, ?2)")?;
        for url in urls {
            count += stmt.execute(rusqlite::params![url, parent])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_pending(conn: &Connection, limit: usize) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare("SELECT id, url FROM queue WHERE status = ?1 ORDER BY id LIMIT ?2")?;
    let rows = stmt
        .query_map(rusqlite::params![PENDING, limit as i64], |row| {
            Ok(QueueEntry {
                id: row.get(0)?,
                url: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_visited(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE queue SET status = ?1, error = NULL, visited_at = datetime('now') WHERE id = ?2",
        rusqlite::params![VISITED, id],
    )?;
    Ok(())
}

pub fn mark_failed(conn: &Connection, id: i64, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE queue SET status = ?1, error = ?2, visited_at = datetime('now') WHERE id = ?3",
        rusqlite::params![FAILED, error, id],
    )?;
    Ok(())
}

pub fn count_pending(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM queue WHERE status = ?1", [PENDING], |r| r.get(0))?;
    Ok(n as usize)
}

pub fn queue_stats(conn: &Connection) -> Result<QueueStats> {
    let count = |status: i64| -> Result<usize> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM queue WHERE status = ?1", [status], |r| r.get(0))?;
        Ok(n as usize)
    };
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM queue", [], |r| r.get(0))?;
    Ok(QueueStats {
        total: total as usize,
        pending: count(PENDING)?,
        visited: count(VISITED)?,
        failed: count(FAILED)?,
    })
}
