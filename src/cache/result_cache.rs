//! SQLite 结果缓存
//!
//! 两张表：cached_results(id, query, metadata, result) 保存原始结果，
//! cache_vectors(id, key, embedding) 保存 "{tag}:{query}" 的向量，id 与前者一致。
//! lookup 取余弦距离最近的一条，距离严格小于阈值才命中；不做淘汰。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::core::CacheError;
use crate::llm::Embedder;

/// 默认命中阈值（余弦距离）
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.05;

/// 缓存数据库文件名
pub const DB_FILE_NAME: &str = "db.sqlite3";

/// 一条缓存结果
#[derive(Debug, Clone, Serialize)]
pub struct CachedEntry {
    pub id: i64,
    pub query: String,
    pub metadata: Option<String>,
    pub result: String,
}

/// 余弦距离 1 - cos(a, b)；长度不同或含零向量时视为最远（1.0）
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// 缓存键：工具标签 + 查询文本
pub fn cache_key(tag: &str, query: &str) -> String {
    format!("{}:{}", tag, query)
}

fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cached_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            metadata TEXT,
            result BLOB NOT NULL
        );
        CREATE TABLE IF NOT EXISTS cache_vectors (
            id INTEGER PRIMARY KEY,
            key TEXT NOT NULL,
            embedding BLOB NOT NULL
        );",
    )?;
    Ok(())
}

/// 相似度结果缓存：连接由 Mutex 保护，写入在单个事务中完成
pub struct ResultCache {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("threshold", &self.threshold)
            .field("path", &self.path)
            .finish()
    }
}

impl ResultCache {
    /// 打开（或创建）{dir}/db.sqlite3
    pub fn open(
        dir: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        threshold: f32,
    ) -> Result<Self, CacheError> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(DB_FILE_NAME);
        let conn = Connection::open(&path)?;
        initialize_schema(&conn)?;
        tracing::info!(path = %path.display(), threshold, "result cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            threshold,
            path: Some(path),
        })
    }

    /// 内存数据库（测试用）
    pub fn in_memory(embedder: Arc<dyn Embedder>, threshold: f32) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            threshold,
            path: None,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Embedding("cache connection mutex poisoned".to_string()))
    }

    async fn embed_key(&self, tag: &str, query: &str) -> Result<Vec<f32>, CacheError> {
        self.embedder
            .embed(&cache_key(tag, query))
            .await
            .map_err(CacheError::Embedding)
    }

    /// 最近邻 (id, distance)
    fn nearest(conn: &Connection, vector: &[f32]) -> Result<Option<(i64, f32)>, CacheError> {
        let mut stmt = conn.prepare("SELECT id, embedding FROM cache_vectors")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut best: Option<(i64, f32)> = None;
        for row in rows {
            let (id, blob) = row?;
            let d = cosine_distance(vector, &decode_vector(&blob));
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        Ok(best)
    }

    /// 查找缓存：最近邻距离 < 阈值时返回结果
    pub async fn lookup(&self, tag: &str, query: &str) -> Result<Option<String>, CacheError> {
        let vector = self.embed_key(tag, query).await?;
        let conn = self.lock()?;
        let Some((id, distance)) = Self::nearest(&conn, &vector)? else {
            tracing::debug!(tag, query, "cache empty");
            return Ok(None);
        };
        if distance >= self.threshold {
            tracing::debug!(tag, query, distance, "cache miss");
            return Ok(None);
        }
        let result: Option<String> = conn
            .query_row(
                "SELECT result FROM cached_results WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        tracing::info!(tag, query, id, distance, "cache hit");
        Ok(result)
    }

    /// 写入结果并返回新分配的 id（结果行与向量行同一事务）
    pub async fn store(&self, tag: &str, query: &str, result: &str) -> Result<i64, CacheError> {
        let vector = self.embed_key(tag, query).await?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO cached_results (query, metadata, result) VALUES (?1, NULL, ?2)",
            params![query, result],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO cache_vectors (id, key, embedding) VALUES (?1, ?2, ?3)",
            params![id, cache_key(tag, query), encode_vector(&vector)],
        )?;
        tx.commit()?;
        tracing::debug!(tag, query, id, "cache stored");
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<CachedEntry>, CacheError> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                "SELECT id, query, metadata, result FROM cached_results WHERE id = ?1",
                params![id],
                |row| {
                    Ok(CachedEntry {
                        id: row.get(0)?,
                        query: row.get(1)?,
                        metadata: row.get(2)?,
                        result: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// 全部条目，最新在前
    pub fn entries(&self) -> Result<Vec<CachedEntry>, CacheError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, query, metadata, result FROM cached_results ORDER BY id DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                metadata: row.get(2)?,
                result: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 清空两张表
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let n = tx.execute("DELETE FROM cached_results", [])?;
        tx.execute("DELETE FROM cache_vectors", [])?;
        tx.commit()?;
        tracing::info!(removed = n, "result cache cleared");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;
    use async_trait::async_trait;

    fn cache() -> ResultCache {
        ResultCache::in_memory(Arc::new(HashingEmbedder::new(128)), DEFAULT_SIMILARITY_THRESHOLD)
            .unwrap()
    }

    /// 固定向量嵌入：按 key 返回预设向量，用于精确控制距离
    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
            Ok(match text {
                "T:stored" => vec![1.0, 0.0],
                // cos = 0.96 → distance 0.04
                "T:near" => vec![0.96, 0.28],
                // cos = 0.94 → distance 0.06
                "T:far" => vec![0.94, 0.341_174_5],
                _ => vec![0.0, 1.0],
            })
        }
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_store_then_lookup_hits() {
        let c = cache();
        assert!(c.lookup("GoogleSearch", "rust async").await.unwrap().is_none());
        c.store("GoogleSearch", "rust async", "result-a").await.unwrap();
        assert_eq!(
            c.lookup("GoogleSearch", "rust async").await.unwrap().as_deref(),
            Some("result-a")
        );
    }

    #[tokio::test]
    async fn test_tag_separates_keys() {
        let c = cache();
        c.store("GoogleNews", "rust async", "news").await.unwrap();
        c.store("GoogleSearch", "rust async", "web").await.unwrap();
        assert_eq!(
            c.lookup("GoogleSearch", "rust async").await.unwrap().as_deref(),
            Some("web")
        );
    }

    #[tokio::test]
    async fn test_hit_requires_distance_below_threshold() {
        let c = ResultCache::in_memory(Arc::new(FixedEmbedder), 0.05).unwrap();
        c.store("T", "stored", "value").await.unwrap();
        assert_eq!(c.lookup("T", "near").await.unwrap().as_deref(), Some("value"));
        assert!(c.lookup("T", "far").await.unwrap().is_none());
        assert!(c.lookup("T", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_distinct_and_entries_newest_first() {
        let c = cache();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(c.store("Dummy", &format!("q{}", i), "r").await.unwrap());
        }
        let mut dedup = ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), ids.len());

        let entries = c.entries().unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].id, *ids.last().unwrap());
        assert_eq!(c.get(ids[3]).unwrap().unwrap().query, "q3");
    }

    #[tokio::test]
    async fn test_concurrent_stores_do_not_collide() {
        let c = Arc::new(cache());
        let mut handles = Vec::new();
        for i in 0..16 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                c.store("Dummy", &format!("concurrent {}", i), "r").await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn test_clear_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(64));
        {
            let c = ResultCache::open(dir.path(), embedder.clone(), 0.05).unwrap();
            c.store("Scrape", "https://example.com", "page").await.unwrap();
        }
        let c = ResultCache::open(dir.path(), embedder, 0.05).unwrap();
        assert_eq!(
            c.lookup("Scrape", "https://example.com").await.unwrap().as_deref(),
            Some("page")
        );
        assert_eq!(c.clear().unwrap(), 1);
        assert!(c.entries().unwrap().is_empty());
    }
}
