//! Redis-backed document database
//!
//! Storage layout:
//! - Document: hash at `prefix + collection + "/" + id`. Each field holds the
//!   JSON encoding of its value. The empty-named field holds the document
//!   version, so documents without fields still exist.
//! - Collection: set at `prefix + collection` listing its document IDs.
//! - Version counter: integer at `prefix + "/version"`. Every write stamps
//!   the document with a fresh value from it.
//!
//! Writes run as one Lua script per call, so a batch applies all-or-nothing.
//! Merge writes read the stored documents first, merge locally and only apply
//! if no document changed in between, retrying otherwise.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::traits::{merge_document, BatchOp, Document, DocumentDatabase, DocumentPath, SetOptions};
use crate::error::{DatabaseError, DatabaseResult};

/// Field present in every stored hash, holding its version; not part of the
/// document data
const VERSION_FIELD: &str = "";

/// Attempts of a merge write before reporting a conflict
const MAX_WRITE_ATTEMPTS: usize = 8;

/// Applies a list of writes. KEYS holds a document key and an index key per
/// write, then the version counter. ARGV holds per write: kind, document ID,
/// expected version (-1 for none), field count, then field/value pairs.
/// Returns 0 without writing anything when an expected version does not match.
const APPLY_WRITES: &str = r#"
local writes = {}
local pos = 1
for i = 1, #KEYS - 1, 2 do
    local count = tonumber(ARGV[pos + 3])
    writes[#writes + 1] = {
        doc = KEYS[i], index = KEYS[i + 1], kind = ARGV[pos], id = ARGV[pos + 1],
        expect = tonumber(ARGV[pos + 2]), first = pos + 4, count = count,
    }
    pos = pos + 4 + count * 2
end
for _, w in ipairs(writes) do
    if w.expect >= 0 and tonumber(redis.call('HGET', w.doc, '') or '0') ~= w.expect then
        return 0
    end
end
for _, w in ipairs(writes) do
    redis.call('DEL', w.doc)
    if w.kind == 'del' then
        redis.call('SREM', w.index, w.id)
    else
        redis.call('HSET', w.doc, '', redis.call('INCR', KEYS[#KEYS]))
        for j = w.first, w.first + w.count * 2 - 1, 2 do
            redis.call('HSET', w.doc, ARGV[j], ARGV[j + 1])
        end
        redis.call('SADD', w.index, w.id)
    end
end
return 1
"#;

/// Redis document database
///
/// # Example
///
/// ```rust,ignore
/// use docstore_session::{DocumentStore, RedisDatabase};
///
/// let db = RedisDatabase::from_url("redis://127.0.0.1/").await?;
/// let store = DocumentStore::new(db);
/// ```
pub struct RedisDatabase {
    conn: Arc<ConnectionManager>,
    prefix: String,
}

impl RedisDatabase {
    /// Create a new Redis database with the default key prefix "docstore:"
    pub async fn new(client: redis::Client) -> DatabaseResult<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection_manager(conn))
    }

    /// Create a new Redis database from a connection string
    pub async fn from_url(url: &str) -> DatabaseResult<Self> {
        let client = redis::Client::open(url)?;
        Self::new(client).await
    }

    /// Create a new Redis database from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
            prefix: "docstore:".to_string(),
        }
    }

    /// Build with custom key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn collection_key(&self, collection: &str) -> String {
        format!("{}{}", self.prefix, collection)
    }

    fn document_key(&self, path: &DocumentPath) -> String {
        format!("{}{}/{}", self.prefix, path.collection(), path.id())
    }

    fn version_key(&self) -> String {
        format!("{}/version", self.prefix)
    }

    fn connection(&self) -> ConnectionManager {
        (*self.conn).clone()
    }

    /// Read the current state of every document a merge write targets
    async fn fetch_merge_targets<'a>(
        &self,
        conn: &mut ConnectionManager,
        ops: &'a [BatchOp],
    ) -> DatabaseResult<HashMap<&'a DocumentPath, Option<StoredDocument>>> {
        let mut targets: Vec<&DocumentPath> = Vec::new();
        for op in ops {
            if let BatchOp::Set { path, options, .. } = op {
                if options.merge && !targets.contains(&path) {
                    targets.push(path);
                }
            }
        }
        if targets.is_empty() {
            return Ok(HashMap::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for path in &targets {
            pipe.hgetall(self.document_key(path));
        }
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(conn).await?;

        targets
            .into_iter()
            .zip(hashes)
            .map(|(path, fields)| decode_fields(fields).map(|stored| (path, stored)))
            .collect()
    }

    /// Run planned writes; false when a read document changed in the meantime
    async fn apply(
        &self,
        conn: &mut ConnectionManager,
        writes: &[PlannedWrite<'_>],
    ) -> DatabaseResult<bool> {
        let script = redis::Script::new(APPLY_WRITES);
        let mut invocation = script.prepare_invoke();
        for write in writes {
            invocation
                .key(self.document_key(write.path))
                .key(self.collection_key(write.path.collection()));
            let kind = if write.fields.is_some() { "set" } else { "del" };
            invocation
                .arg(kind)
                .arg(write.path.id())
                .arg(write.expect.unwrap_or(-1));
            match &write.fields {
                Some(fields) => {
                    invocation.arg(fields.len());
                    for (name, value) in fields {
                        invocation.arg(name).arg(value);
                    }
                }
                None => {
                    invocation.arg(0);
                }
            }
        }
        invocation.key(self.version_key());

        let applied: i64 = invocation.invoke_async(conn).await?;
        Ok(applied == 1)
    }

    /// Apply writes atomically, re-reading and re-merging on conflicts
    async fn write(&self, ops: &[BatchOp]) -> DatabaseResult<()> {
        let mut conn = self.connection();
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let stored = self.fetch_merge_targets(&mut conn, ops).await?;
            let writes = plan_writes(ops, stored)?;
            if self.apply(&mut conn, &writes).await? {
                return Ok(());
            }
            debug!(attempt, "Documents changed during merge write, retrying");
        }
        Err(DatabaseError::Conflict(format!(
            "documents kept changing after {} attempts",
            MAX_WRITE_ATTEMPTS
        )))
    }
}

impl Clone for RedisDatabase {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
        }
    }
}

/// A document as read from its hash
#[derive(Debug, PartialEq)]
struct StoredDocument {
    version: i64,
    data: Document,
}

/// One write ready to send to the script
#[derive(Debug, PartialEq)]
struct PlannedWrite<'a> {
    path: &'a DocumentPath,
    /// Version the document must still have, when it was read for a merge
    expect: Option<i64>,
    /// Encoded fields that replace the hash; `None` deletes the document
    fields: Option<Vec<(String, String)>>,
}

/// Resolve each write into the full hash it leaves behind.
///
/// `stored` holds the documents read for merge writes. Writes apply in order,
/// so a merge sees the result of earlier writes to the same document.
fn plan_writes<'a>(
    ops: &'a [BatchOp],
    stored: HashMap<&'a DocumentPath, Option<StoredDocument>>,
) -> DatabaseResult<Vec<PlannedWrite<'a>>> {
    let mut versions = HashMap::new();
    let mut current = HashMap::new();
    for (path, document) in stored {
        versions.insert(path, document.as_ref().map_or(0, |d| d.version));
        current.insert(path, document.map(|d| d.data));
    }

    let mut writes = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            BatchOp::Set {
                path,
                data,
                options,
            } => {
                let mut document = if options.merge {
                    current.remove(path).flatten().unwrap_or_default()
                } else {
                    Document::new()
                };
                merge_document(&mut document, data);
                let fields = encode_fields(&document)?;
                current.insert(path, Some(document));
                writes.push(PlannedWrite {
                    path,
                    expect: versions.get(path).copied(),
                    fields: Some(fields),
                });
            }
            BatchOp::Delete { path } => {
                current.insert(path, None);
                writes.push(PlannedWrite {
                    path,
                    expect: None,
                    fields: None,
                });
            }
        }
    }
    Ok(writes)
}

fn encode_fields(data: &Document) -> DatabaseResult<Vec<(String, String)>> {
    let mut fields = Vec::with_capacity(data.len());
    for (name, value) in data {
        if name.is_empty() {
            return Err(DatabaseError::Encoding(
                "empty field names are not supported".to_string(),
            ));
        }
        fields.push((name.clone(), serde_json::to_string(value)?));
    }
    Ok(fields)
}

/// Decode a stored hash; `None` when the hash does not exist
fn decode_fields(fields: HashMap<String, String>) -> DatabaseResult<Option<StoredDocument>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let mut version = 0;
    let mut data = Document::new();
    for (name, raw) in fields {
        if name == VERSION_FIELD {
            version = raw
                .parse()
                .map_err(|_| DatabaseError::Encoding(format!("invalid document version {:?}", raw)))?;
            continue;
        }
        data.insert(name, serde_json::from_str(&raw)?);
    }
    Ok(Some(StoredDocument { version, data }))
}

#[async_trait]
impl DocumentDatabase for RedisDatabase {
    async fn get_document(&self, path: &DocumentPath) -> DatabaseResult<DocumentSnapshot> {
        let mut conn = self.connection();
        let fields: HashMap<String, String> = conn.hgetall(self.document_key(path)).await?;

        Ok(match decode_fields(fields)? {
            Some(stored) => DocumentSnapshot::found(path.clone(), stored.data),
            None => DocumentSnapshot::missing(path.clone()),
        })
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: &Document,
        options: SetOptions,
    ) -> DatabaseResult<()> {
        self.write(&[BatchOp::Set {
            path: path.clone(),
            data: data.clone(),
            options,
        }])
        .await
    }

    async fn delete_document(&self, path: &DocumentPath) -> DatabaseResult<()> {
        let mut conn = self.connection();
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(self.document_key(path));
        pipe.srem(self.collection_key(path.collection()), path.id());

        let (deleted, _): (i64, i64) = pipe.query_async(&mut conn).await?;
        if deleted == 0 {
            return Err(DatabaseError::not_found(path.collection(), path.id()));
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> DatabaseResult<QuerySnapshot> {
        let mut conn = self.connection();
        let mut ids: Vec<String> = conn.smembers(self.collection_key(collection)).await?;
        if ids.is_empty() {
            return Ok(QuerySnapshot::default());
        }
        ids.sort();

        let mut paths = Vec::with_capacity(ids.len());
        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &ids {
            let path = DocumentPath::new(collection, id)?;
            pipe.hgetall(self.document_key(&path));
            paths.push(path);
        }
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        let mut docs = Vec::with_capacity(paths.len());
        for (path, fields) in paths.into_iter().zip(hashes) {
            // Skip documents deleted between SMEMBERS and the read
            if let Some(stored) = decode_fields(fields)? {
                docs.push(DocumentSnapshot::found(path, stored.data));
            }
        }
        Ok(QuerySnapshot::new(docs))
    }

    async fn commit_batch(&self, ops: Vec<BatchOp>) -> DatabaseResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.write(&ops).await
    }
}
