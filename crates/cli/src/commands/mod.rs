pub mod chat;
pub mod history;
pub mod init;
pub mod models;
pub mod serve;
