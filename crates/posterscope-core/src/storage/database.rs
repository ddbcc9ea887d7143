use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{PosterscopeError, Result};
use crate::models::PaperRecord;

const PAPER_COLUMNS: &str = "id, title, authors, overview, conference_name, pdf_found, pdf_path,
     pdf_url, source_files, created_at, updated_at, version";

/// A cached conference-level summary.
#[derive(Debug, Clone, Serialize)]
pub struct ConferenceSummary {
    pub conference_name: String,
    pub summary: String,
    pub generated_at: DateTime<Utc>,
    pub paper_count: usize,
}

/// SQLite store for paper records.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS papers (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                authors         TEXT DEFAULT '[]',
                overview        TEXT,
                conference_name TEXT,
                pdf_found       INTEGER NOT NULL DEFAULT 0,
                pdf_path        TEXT,
                pdf_url         TEXT,
                source_files    TEXT DEFAULT '[]',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                version         INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS conference_summaries (
                conference_name TEXT PRIMARY KEY,
                summary         TEXT NOT NULL,
                generated_at    TEXT NOT NULL,
                paper_count     INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_papers_conference ON papers(conference_name);
            CREATE INDEX IF NOT EXISTS idx_papers_pdf_found  ON papers(pdf_found);
            ",
        )?;
        Ok(())
    }

    // ─── Paper CRUD ─────────────────────────────────────────

    /// Insert or replace a paper record.
    pub fn save_paper(&self, record: &PaperRecord) -> Result<()> {
        let authors_json = serde_json::to_string(&record.authors)?;
        let sources_json = serde_json::to_string(&record.source_files)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO papers
                (id, title, authors, overview, conference_name, pdf_found, pdf_path,
                 pdf_url, source_files, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.to_string(),
                record.title,
                authors_json,
                record.overview,
                record.conference_name,
                record.pdf_found,
                record.pdf_path,
                record.pdf_url,
                sources_json,
                record.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                record.version,
            ],
        )?;
        Ok(())
    }

    pub fn get_paper(&self, id: &Uuid) -> Result<PaperRecord> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id.to_string()], row_to_record)
            .optional()?
            .ok_or_else(|| PosterscopeError::PaperNotFound(id.to_string()))
    }

    /// Resolve a full id or a unique id prefix (as printed by listings).
    pub fn find_paper_by_prefix(&self, prefix: &str) -> Result<PaperRecord> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id LIKE ?1 || '%' LIMIT 2");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params![prefix], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(PosterscopeError::PaperNotFound(prefix.to_string())),
            _ => Err(PosterscopeError::ValidationError(format!(
                "id prefix '{prefix}' is ambiguous"
            ))),
        }
    }

    pub fn list_papers(&self, conference: Option<&str>) -> Result<Vec<PaperRecord>> {
        self.query_papers("1 = 1", conference)
    }

    pub fn list_missing_pdf(&self, conference: Option<&str>) -> Result<Vec<PaperRecord>> {
        self.query_papers("pdf_found = 0", conference)
    }

    fn query_papers(&self, filter: &str, conference: Option<&str>) -> Result<Vec<PaperRecord>> {
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers
             WHERE {filter} AND (?1 IS NULL OR conference_name = ?1)
             ORDER BY created_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![conference], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring search over title, authors and overview.
    pub fn search_papers(&self, query: &str, limit: usize) -> Result<Vec<PaperRecord>> {
        let pattern = format!("%{}%", query.trim().to_lowercase());
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers
             WHERE lower(title) LIKE ?1 OR lower(authors) LIKE ?1 OR lower(overview) LIKE ?1
             ORDER BY title ASC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update_overview(&self, id: &Uuid, overview: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE papers SET overview = ?2, updated_at = ?3, version = version + 1
             WHERE id = ?1",
            params![id.to_string(), overview, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(PosterscopeError::PaperNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Mark the paper's PDF as present at `path`.
    pub fn update_pdf_info(&self, id: &Uuid, path: &str, url: Option<&str>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE papers SET pdf_found = 1, pdf_path = ?2, pdf_url = ?3, updated_at = ?4,
                    version = version + 1
             WHERE id = ?1",
            params![id.to_string(), path, url, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(PosterscopeError::PaperNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete_paper(&self, id: &Uuid) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM papers WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    pub fn count_papers(&self, conference: Option<&str>) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM papers WHERE (?1 IS NULL OR conference_name = ?1)",
            params![conference],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn list_conference_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT conference_name FROM papers
             WHERE conference_name IS NOT NULL ORDER BY conference_name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    // ─── Conference summaries ───────────────────────────────

    pub fn save_conference_summary(
        &self,
        conference: &str,
        summary: &str,
        paper_count: usize,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO conference_summaries
                (conference_name, summary, generated_at, paper_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![conference, summary, Utc::now().to_rfc3339(), paper_count as i64],
        )?;
        Ok(())
    }

    pub fn get_conference_summary(&self, conference: &str) -> Result<Option<ConferenceSummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT conference_name, summary, generated_at, paper_count
                 FROM conference_summaries WHERE conference_name = ?1",
                params![conference],
                |row| {
                    Ok(ConferenceSummary {
                        conference_name: row.get(0)?,
                        summary: row.get(1)?,
                        generated_at: parse_timestamp(&row.get::<_, String>(2)?),
                        paper_count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<PaperRecord> {
    let id_str: String = row.get(0)?;
    let authors_str: Option<String> = row.get(2)?;
    let sources_str: Option<String> = row.get(8)?;

    Ok(PaperRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        title: row.get(1)?,
        authors: authors_str
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        overview: row.get(3)?,
        conference_name: row.get(4)?,
        pdf_found: row.get(5)?,
        pdf_path: row.get(6)?,
        pdf_url: row.get(7)?,
        source_files: sources_str
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        created_at: parse_timestamp(&row.get::<_, String>(9)?),
        updated_at: parse_timestamp(&row.get::<_, String>(10)?),
        version: row.get(11)?,
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
