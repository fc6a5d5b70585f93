use log::{error, info, warn};
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use rocket::fairing::AdHoc;

pub mod store;

pub use store::MongoStore;

pub const FORMS: &str = "forms";
pub const REVIEWS: &str = "reviews";
pub const SUBSCRIBERS: &str = "subscribers";

const DUPLICATE_KEY: i32 = 11000;

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                if let Err(e) = ensure_indexes(&database).await {
                    warn!("Failed to create MongoDB indexes: {}", e);
                }
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    Ok(client.database(&crate::config::Config::database_name()))
}

async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<mongodb::bson::Document>(FORMS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>(REVIEWS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "form_id": 1, "created_at": -1 })
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>(SUBSCRIBERS)
        .create_index(
            IndexModel::builder()
                .keys(doc! { "form_id": 1, "channel": 1, "identity": 1 })
                .options(unique())
                .build(),
            None,
        )
        .await?;

    Ok(())
}

pub type DbConn = Database;

/// True when a write was rejected by one of the unique indexes.
pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(err)) => err.code == DUPLICATE_KEY,
        ErrorKind::Command(err) => err.code == DUPLICATE_KEY,
        _ => false,
    }
}
