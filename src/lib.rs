pub mod audit;
pub mod auth;
pub mod bates;
pub mod cases;
pub mod config;
pub mod db;
pub mod error;
pub mod intake;
pub mod models;
pub mod privilege_entries;
pub mod privilege_log;
pub mod productions;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod utils {
    pub mod json;
}
