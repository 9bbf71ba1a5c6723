//! Basic example using the in-memory document database
//!
//! Walks through the session lifecycle the way a middleware would drive it.
//! Run with: cargo run --example basic

use docstore_session::{
    DocumentStore, MemoryDatabase, SessionData, SessionError, SessionStore, StoreOptions,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Overwrite writes so each save replaces the whole session
    let store = DocumentStore::with_options(
        MemoryDatabase::new(),
        StoreOptions::new().with_collection("custom").with_merge(false),
    );

    // Session IDs come from the middleware; generate one the same way
    let sid = Uuid::new_v4().to_string();

    let mut data = SessionData::new();
    data.set("name", "Ann")?;
    store.set(&sid, &data).await?;
    println!("after first save:  {:?}", store.get(&sid).await?);

    let mut data = SessionData::new();
    data.set("age", 30)?;
    store.set(&sid, &data).await?;
    println!("after second save: {:?}", store.get(&sid).await?);

    println!("sessions stored:   {}", store.length().await?);

    store.destroy(&sid).await?;
    match store.get(&sid).await {
        Err(e) if e.is_not_found() => println!("after destroy:     {}", e),
        other => println!("unexpected:        {:?}", other),
    }

    // Deleting twice reports the missing document
    if let Err(e) = store.destroy(&sid).await {
        println!("destroy again:     {}", e);
    }

    store.clear().await?;
    println!("after clear:       {} sessions", store.all().await?.len());

    Ok(())
}
