use crate::modules::context::Initialize;
use crate::modules::database::MESSAGE_MODELS;
use crate::modules::error::{code::ErrorCode, HoldMailError, HoldMailResult};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::raise_error;
use native_db::{Builder, Database};
use std::sync::{Arc, LazyLock, OnceLock};
use tracing::info;

pub static DB_MANAGER: LazyLock<DatabaseManager> = LazyLock::new(DatabaseManager::new);

pub struct DatabaseManager {
    message_db: OnceLock<Arc<Database<'static>>>,
}

impl DatabaseManager {
    fn new() -> Self {
        DatabaseManager {
            message_db: OnceLock::new(),
        }
    }

    /// The held-message database. Opened on first use when `initialize` was not called first.
    pub fn message_db(&self) -> &Arc<Database<'static>> {
        self.message_db.get_or_init(|| match Self::init_message_database() {
            Ok(database) => database,
            Err(e) => panic!("Failed to initialize message database: {}", e),
        })
    }

    fn init_message_database() -> HoldMailResult<Arc<Database<'static>>> {
        if SETTINGS.holdmail_memory_mode_enabled {
            info!("Holding messages in memory only");
            return Ok(Arc::new(
                Builder::new()
                    .create_in_memory(&MESSAGE_MODELS)
                    .map_err(Self::handle_database_error)?,
            ));
        }
        info!(
            "Initializing message database at: {:?}",
            &DATA_DIR_MANAGER.message_db
        );
        Self::open_file_database(&DATA_DIR_MANAGER.message_db)
    }

    pub(crate) fn open_file_database(
        path: &std::path::Path,
    ) -> HoldMailResult<Arc<Database<'static>>> {
        let mut database = Builder::new()
            .create(&MESSAGE_MODELS, path)
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    fn handle_database_error(error: native_db::db_type::Error) -> HoldMailError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "Database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("Database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("Failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> HoldMailResult<()> {
        let database = tokio::task::spawn_blocking(Self::init_message_database)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))??;
        let _ = DB_MANAGER.message_db.set(database);
        Ok(())
    }
}
