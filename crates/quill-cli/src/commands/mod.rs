pub mod add;
pub mod common;
pub mod config;
pub mod delete;
pub mod edit;
pub mod list;
pub mod retry;
pub mod search;
pub mod show;
pub mod status;
pub mod sync;
pub mod tags;
pub mod watch;
