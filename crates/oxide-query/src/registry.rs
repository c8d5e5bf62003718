//! Process-wide default database.
//!
//! A convenience for tests and scripts. Application code should pass a
//! [`Database`] around explicitly.

use std::sync::{PoisonError, RwLock};

use crate::database::Database;
use crate::error::{QueryError, Result};

static DEFAULT: RwLock<Option<Database>> = RwLock::new(None);

/// Installs the default database, replacing any previous one.
pub fn set_default(database: Database) {
    *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = Some(database);
}

/// Removes the default database.
pub fn clear_default() {
    *DEFAULT.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Returns the default database.
pub fn default_database() -> Result<Database> {
    DEFAULT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| QueryError::Configuration(String::from("no default database registered")))
}
