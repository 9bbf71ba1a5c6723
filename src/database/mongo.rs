//! MongoDB-backed document database
//!
//! Each collection name maps to a MongoDB collection and each document to a
//! MongoDB document whose `_id` is the document ID. Field values are converted
//! from JSON to BSON on write and read back as relaxed extended JSON.
//!
//! ## Usage
//!
//! Enable the `mongodb-backend` feature in Cargo.toml:
//!
//! ```toml
//! docstore-session = { version = "0.1", features = ["mongodb-backend"] }
//! ```
//!
//! Merge writes are update pipelines, which need MongoDB 4.2+. Batches run in a
//! multi-document transaction, which needs a replica set or a sharded cluster.
//!
//! Field names must be non-empty, must not contain `.` and must not start with
//! `$`, at any depth; the top-level name `_id` is reserved for the document ID.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson},
    options::ClientOptions,
    Client, ClientSession, Collection,
};

use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use serde_json::Value;

use super::traits::{BatchOp, Document, DocumentDatabase, DocumentPath, SetOptions};
use crate::error::{DatabaseError, DatabaseResult};

const ID_FIELD: &str = "_id";

/// MongoDB document database
pub struct MongoDatabase {
    client: Client,
    database: mongodb::Database,
}

impl MongoDatabase {
    /// Connect to MongoDB
    ///
    /// # Arguments
    /// * `connection_string` - MongoDB connection string
    /// * `database` - Database name
    pub async fn new(connection_string: &str, database: &str) -> DatabaseResult<Self> {
        let client_options = ClientOptions::parse(connection_string).await?;
        let client = Client::with_options(client_options)?;
        Ok(Self::from_client(client, database))
    }

    /// Use an existing client
    pub fn from_client(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    /// Get the MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn mongo_collection(&self, name: &str) -> Collection<bson::Document> {
        self.database.collection::<bson::Document>(name)
    }

    /// Write one document, inside `session` when given
    async fn write(
        &self,
        path: &DocumentPath,
        data: &Document,
        options: SetOptions,
        session: Option<&mut ClientSession>,
    ) -> DatabaseResult<()> {
        let coll = self.mongo_collection(path.collection());
        let filter = doc! { "_id": path.id() };

        if options.merge {
            let update = vec![merge_stage(path, data)?];
            let action = coll.update_one(filter, update).upsert(true);
            match session {
                Some(session) => action.session(session).await?,
                None => action.await?,
            };
        } else {
            let action = coll.replace_one(filter, to_bson_document(data)?).upsert(true);
            match session {
                Some(session) => action.session(session).await?,
                None => action.await?,
            };
        }
        Ok(())
    }
}

impl Clone for MongoDatabase {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            database: self.database.clone(),
        }
    }
}

/// Reject names MongoDB would read as paths or operators
fn check_field_name(name: &str) -> DatabaseResult<()> {
    if name.is_empty() || name.contains('.') || name.starts_with('$') {
        return Err(DatabaseError::Encoding(format!(
            "field name {:?} is not supported",
            name
        )));
    }
    Ok(())
}

fn check_value(value: &Value) -> DatabaseResult<()> {
    match value {
        Value::Object(map) => map.iter().try_for_each(|(name, value)| {
            check_field_name(name)?;
            check_value(value)
        }),
        Value::Array(items) => items.iter().try_for_each(check_value),
        _ => Ok(()),
    }
}

fn check_document(data: &Document) -> DatabaseResult<()> {
    for (name, value) in data {
        if name == ID_FIELD {
            return Err(DatabaseError::Encoding(format!(
                "field name {} is reserved",
                ID_FIELD
            )));
        }
        check_field_name(name)?;
        check_value(value)?;
    }
    Ok(())
}

fn to_bson(value: &Value) -> DatabaseResult<Bson> {
    Bson::try_from(value.clone()).map_err(|e| DatabaseError::Encoding(e.to_string()))
}

fn to_bson_document(data: &Document) -> DatabaseResult<bson::Document> {
    check_document(data)?;
    let mut fields = bson::Document::new();
    for (name, value) in data {
        fields.insert(name.clone(), to_bson(value)?);
    }
    Ok(fields)
}

/// Pipeline stage merging `data` into the stored document.
///
/// A non-empty map merges into a stored map key by key; any other value,
/// including an empty map, replaces the stored value. On upsert nothing is
/// stored yet, so every field takes its literal value.
fn merge_stage(path: &DocumentPath, data: &Document) -> DatabaseResult<bson::Document> {
    check_document(data)?;
    let mut fields = merge_fields(data, None)?;
    if fields.is_empty() {
        // A $set stage needs at least one field
        fields.insert(ID_FIELD, path.id());
    }
    Ok(doc! { "$set": fields })
}

fn merge_fields(data: &Document, parent: Option<&str>) -> DatabaseResult<bson::Document> {
    let mut fields = bson::Document::new();
    for (name, value) in data {
        let field_path = match parent {
            Some(parent) => format!("{}.{}", parent, name),
            None => name.clone(),
        };
        fields.insert(name.clone(), merge_expression(&field_path, value)?);
    }
    Ok(fields)
}

fn merge_expression(field_path: &str, value: &Value) -> DatabaseResult<Bson> {
    let literal = doc! { "$literal": to_bson(value)? };
    let Value::Object(map) = value else {
        return Ok(Bson::Document(literal));
    };
    if map.is_empty() {
        return Ok(Bson::Document(literal));
    }

    let stored = format!("${}", field_path);
    let nested = merge_fields(map, Some(field_path))?;
    Ok(Bson::Document(doc! {
        "$cond": {
            "if": { "$eq": [{ "$type": stored.clone() }, "object"] },
            "then": { "$mergeObjects": [stored, nested] },
            "else": literal,
        }
    }))
}

fn from_bson_document(mut fields: bson::Document) -> DatabaseResult<Document> {
    fields.remove(ID_FIELD);
    match Bson::Document(fields).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Encoding(format!(
            "expected a document, got {}",
            other
        ))),
    }
}

#[async_trait]
impl DocumentDatabase for MongoDatabase {
    async fn get_document(&self, path: &DocumentPath) -> DatabaseResult<DocumentSnapshot> {
        let found = self
            .mongo_collection(path.collection())
            .find_one(doc! { "_id": path.id() })
            .await?;

        Ok(match found {
            Some(fields) => DocumentSnapshot::found(path.clone(), from_bson_document(fields)?),
            None => DocumentSnapshot::missing(path.clone()),
        })
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: &Document,
        options: SetOptions,
    ) -> DatabaseResult<()> {
        self.write(path, data, options, None).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> DatabaseResult<()> {
        let result = self
            .mongo_collection(path.collection())
            .delete_one(doc! { "_id": path.id() })
            .await?;

        if result.deleted_count == 0 {
            return Err(DatabaseError::not_found(path.collection(), path.id()));
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> DatabaseResult<QuerySnapshot> {
        let mut cursor = self
            .mongo_collection(collection)
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await?;

        let mut docs = Vec::new();
        while let Some(fields) = cursor.try_next().await? {
            let id = match fields.get(ID_FIELD) {
                Some(Bson::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            let path = DocumentPath::new(collection, &id)?;
            docs.push(DocumentSnapshot::found(path, from_bson_document(fields)?));
        }
        Ok(QuerySnapshot::new(docs))
    }

    async fn commit_batch(&self, ops: Vec<BatchOp>) -> DatabaseResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        // Dropping the session before commit aborts the transaction
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        for op in &ops {
            match op {
                BatchOp::Set {
                    path,
                    data,
                    options,
                } => self.write(path, data, *options, Some(&mut session)).await?,
                BatchOp::Delete { path } => {
                    self.mongo_collection(path.collection())
                        .delete_one(doc! { "_id": path.id() })
                        .session(&mut session)
                        .await?;
                }
            }
        }

        session.commit_transaction().await?;
        Ok(())
    }
}
