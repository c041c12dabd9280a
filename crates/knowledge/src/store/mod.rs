//! SQLite-backed topic store.
//!
//! Topics live in a plain table with their embedding stored as a
//! little-endian `f32` blob; an FTS5 table sharing the same rowid serves
//! lexical queries. Nearest-neighbour search is an exact scan over every
//! stored embedding.

mod pool;

use crate::types::{NewTopic, ScoredTopic, StoreStats, Topic};
use chrono::{DateTime, Utc};
use pool::{open_connection, ConnectionPool};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use topica_core::{AppError, AppResult};

const LAST_INGEST_KEY: &str = "last_ingest_at";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    subtitle TEXT,
    content TEXT,
    url TEXT NOT NULL UNIQUE,
    embedding BLOB
);

CREATE VIRTUAL TABLE IF NOT EXISTS topics_fts USING fts5(
    title,
    subtitle,
    content,
    tokenize = 'unicode61 remove_diacritics 2'
);

CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Read access to stored topics, as needed by similarity search.
#[async_trait::async_trait]
pub trait TopicIndex: Send + Sync {
    /// Up to `limit` topics with a stored embedding, closest first.
    ///
    /// `score` is the cosine distance to `vector`. Equal distances keep
    /// insertion order.
    async fn nearest(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredTopic>>;

    /// Up to `limit` topics whose title, subtitle or content contain every
    /// term of `query`, most relevant first.
    async fn text_search(&self, query: &str, limit: usize) -> AppResult<Vec<ScoredTopic>>;
}

/// Topic store over a pooled SQLite database file.
#[derive(Debug, Clone)]
pub struct TopicStore {
    path: PathBuf,
    pool: Arc<ConnectionPool>,
}

impl TopicStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path, pool_size: usize) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let conn = open_connection(path)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Store(format!("Failed to create tables: {}", e)))?;
        drop(conn);

        let pool = ConnectionPool::new(path, pool_size)?;
        tracing::debug!(
            "Opened topic store at {:?} (pool size {})",
            path,
            pool.size()
        );

        Ok(Self {
            path: path.to_path_buf(),
            pool: Arc::new(pool),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run blocking SQLite work on a pooled connection.
    ///
    /// Connection opening and the work itself both run on the blocking pool.
    async fn run<F, T>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.pool.acquire().await?;

        tokio::task::spawn_blocking(move || work(guard.connection_mut()?))
            .await
            .map_err(|e| AppError::Store(format!("Store task failed: {}", e)))?
    }

    /// Replace every stored topic with `rows` in a single transaction.
    ///
    /// Identifiers restart at 1. On failure the previous contents are kept.
    pub async fn replace_all(&self, rows: Vec<NewTopic>) -> AppResult<usize> {
        self.run(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Store(format!("Failed to begin transaction: {}", e)))?;

            tx.execute_batch(
                "DELETE FROM topics_fts;
                 DELETE FROM topics;
                 DELETE FROM sqlite_sequence WHERE name = 'topics';",
            )
            .map_err(|e| AppError::Store(format!("Failed to clear topics: {}", e)))?;

            {
                let mut insert_topic = tx
                    .prepare(
                        "INSERT INTO topics (title, subtitle, content, url, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(|e| AppError::Store(format!("Failed to prepare insert: {}", e)))?;
                let mut insert_fts = tx
                    .prepare(
                        "INSERT INTO topics_fts (rowid, title, subtitle, content)
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .map_err(|e| AppError::Store(format!("Failed to prepare insert: {}", e)))?;

                for row in &rows {
                    let blob = row.embedding.as_deref().map(embedding_to_bytes);
                    let id = insert_topic
                        .insert(params![row.title, row.subtitle, row.content, row.url, blob])
                        .map_err(|e| {
                            AppError::Store(format!("Failed to insert topic {}: {}", row.url, e))
                        })?;
                    insert_fts
                        .execute(params![id, row.title, row.subtitle, row.content])
                        .map_err(|e| {
                            AppError::Store(format!("Failed to index topic {}: {}", row.url, e))
                        })?;
                }
            }

            tx.execute(
                "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![LAST_INGEST_KEY, Utc::now().to_rfc3339()],
            )
            .map_err(|e| AppError::Store(format!("Failed to record ingestion time: {}", e)))?;

            tx.commit()
                .map_err(|e| AppError::Store(format!("Failed to commit topics: {}", e)))?;

            tracing::info!("Replaced store contents with {} topics", rows.len());
            Ok(rows.len())
        })
        .await
    }

    /// Counts and last ingestion time.
    pub async fn stats(&self) -> AppResult<StoreStats> {
        let path = self.path.clone();
        self.run(move |conn| {
            let (topics, embedded): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COUNT(embedding) FROM topics",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| AppError::Store(format!("Failed to count topics: {}", e)))?;

            let last_ingest: Option<String> = conn
                .query_row(
                    "SELECT value FROM store_meta WHERE key = ?1",
                    params![LAST_INGEST_KEY],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| AppError::Store(format!("Failed to read store metadata: {}", e)))?;

            let last_ingest_at = last_ingest
                .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
                .map(|ts| ts.with_timezone(&Utc));

            let db_size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            Ok(StoreStats {
                topics: topics.max(0) as u64,
                embedded: embedded.max(0) as u64,
                last_ingest_at,
                db_size_bytes,
            })
        })
        .await
    }
}

#[async_trait::async_trait]
impl TopicIndex for TopicStore {
    async fn nearest(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredTopic>> {
        let query = vector.to_vec();
        self.run(move |conn| nearest_topics(conn, &query, limit)).await
    }

    async fn text_search(&self, query: &str, limit: usize) -> AppResult<Vec<ScoredTopic>> {
        let Some(match_expr) = fts_query(query) else {
            tracing::debug!("Text query has no searchable terms");
            return Ok(Vec::new());
        };
        self.run(move |conn| text_topics(conn, &match_expr, limit)).await
    }
}

fn nearest_topics(conn: &Connection, query: &[f32], limit: usize) -> AppResult<Vec<ScoredTopic>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, subtitle, content, url, embedding FROM topics
             WHERE embedding IS NOT NULL ORDER BY id",
        )
        .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((topic_from_row(row)?, row.get::<_, Vec<u8>>(5)?)))
        .map_err(|e| AppError::Store(format!("Failed to query topics: {}", e)))?;

    let mut scored = Vec::new();
    for row in rows {
        let (topic, blob) =
            row.map_err(|e| AppError::Store(format!("Failed to read topic row: {}", e)))?;
        let embedding = bytes_to_embedding(&blob)?;

        if embedding.len() != query.len() {
            return Err(AppError::Store(format!(
                "Topic {} has a {}-dimension embedding, query has {}",
                topic.id,
                embedding.len(),
                query.len()
            )));
        }

        let score = cosine_distance(query, &embedding);
        scored.push(ScoredTopic { topic, score });
    }

    // Stable: equal distances keep id order
    scored.sort_by(|a, b| a.score.total_cmp(&b.score));
    scored.truncate(limit);

    tracing::debug!("Nearest query returned {} topics", scored.len());
    Ok(scored)
}

fn text_topics(conn: &Connection, match_expr: &str, limit: usize) -> AppResult<Vec<ScoredTopic>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.title, t.subtitle, t.content, t.url, bm25(topics_fts) AS score
             FROM topics_fts JOIN topics t ON t.id = topics_fts.rowid
             WHERE topics_fts MATCH ?1
             ORDER BY score, t.id
             LIMIT ?2",
        )
        .map_err(|e| AppError::Store(format!("Failed to prepare text query: {}", e)))?;

    let rows = stmt
        .query_map(params![match_expr, limit as i64], |row| {
            let bm25: f64 = row.get(5)?;
            Ok(ScoredTopic {
                topic: topic_from_row(row)?,
                // bm25 is negative, more negative is better
                score: (-bm25) as f32,
            })
        })
        .map_err(|e| AppError::Store(format!("Failed to run text query: {}", e)))?;

    let results = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Store(format!("Failed to read topic row: {}", e)))?;

    tracing::debug!("Text query returned {} topics", results.len());
    Ok(results)
}

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        title: row.get(1)?,
        subtitle: row.get(2)?,
        content: row.get(3)?,
        url: row.get(4)?,
    })
}

/// Build an FTS5 expression requiring every alphanumeric term of `raw`.
///
/// Terms are quoted so user input is never parsed as query syntax.
fn fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

/// `1 - cos(a, b)`, in [0, 2]. A zero vector is treated as orthogonal.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store(format!(
            "Invalid embedding blob length: {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
