//! Client library for the Nutri-X recipe and nutrition backend: an HTTP
//! wrapper for its endpoints and the session state it reads from.

pub mod api;
pub mod config;
pub mod models;
pub mod state;
pub mod storage;

pub use api::{API_KEY_HEADER, ApiClient, image_form};
pub use config::{AppConfig, ConfigOverrides};
pub use state::{MealPlan, MealSlot, SessionState};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
