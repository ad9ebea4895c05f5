pub mod api {
    pub mod attachments;
    pub mod documents;
    pub mod errors;
}
pub mod app;
pub mod config;
pub mod db {
    pub mod json_store;
    pub mod models;
    pub mod repository;
}
pub mod error;
pub mod lifecycle;
pub mod storage {
    pub mod client;
    pub mod local;
}
