use core_config::{env_first_of, env_or_default, env_parse_or, ConfigError, FromEnv};

pub const DEFAULT_DATABASE: &str = "fashion";
pub const DEFAULT_COLLECTION: &str = "inventory";

/// Connection settings for the inventory collection
///
/// # Example
///
/// ```ignore
/// use core_config::FromEnv;
/// use domain_inventory::MongoStoreConfig;
///
/// let config = MongoStoreConfig::from_env()?;
/// let repo = MongoInventoryRepository::connect(&config).await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoStoreConfig {
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    pub url: String,
    pub database: String,
    pub collection: String,
    /// Reported to the server for its logs
    pub app_name: Option<String>,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
}

impl MongoStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            app_name: None,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// URL with any `user:password@` credentials masked, for logs.
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***@{}", &self.url[..scheme_end], &self.url[at + 1..])
            }
            _ => self.url.clone(),
        }
    }
}

/// Environment variables:
/// - `MONGODB_URL` or `MONGO_URL` (required)
/// - `MONGODB_DATABASE` or `MONGO_DATABASE` (default: `fashion`)
/// - `INVENTORY_COLLECTION` (default: `inventory`)
/// - `MONGODB_APP_NAME` (optional)
/// - `MONGODB_CONNECT_TIMEOUT_SECS` (default: 10)
/// - `MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (default: 30)
impl FromEnv for MongoStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_first_of(&["MONGODB_URL", "MONGO_URL"])
            .ok_or_else(|| ConfigError::MissingEnvVar("MONGODB_URL or MONGO_URL".to_string()))?;

        let database = env_first_of(&["MONGODB_DATABASE", "MONGO_DATABASE"])
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        Ok(Self {
            url,
            database,
            collection: env_or_default("INVENTORY_COLLECTION", DEFAULT_COLLECTION),
            app_name: std::env::var("MONGODB_APP_NAME").ok(),
            connect_timeout_secs: env_parse_or("MONGODB_CONNECT_TIMEOUT_SECS", 10)?,
            server_selection_timeout_secs: env_parse_or(
                "MONGODB_SERVER_SELECTION_TIMEOUT_SECS",
                30,
            )?,
        })
    }
}
