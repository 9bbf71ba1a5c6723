//! Document database client interface and backends

mod memory;
mod refs;
mod snapshot;
mod traits;

pub use memory::MemoryDatabase;
pub use refs::{CollectionRef, DocumentRef, WriteBatch};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use traits::{merge_document, validate_segment, BatchOp, Document, DocumentDatabase, DocumentPath, SetOptions};

#[cfg(feature = "redis-backend")]
mod redis_db;

#[cfg(feature = "redis-backend")]
pub use redis_db::RedisDatabase;

#[cfg(feature = "mongodb-backend")]
mod mongo;

#[cfg(feature = "mongodb-backend")]
pub use mongo::MongoDatabase;
