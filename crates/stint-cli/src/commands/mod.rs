pub mod add;
pub mod common;
pub mod config;
pub mod daemon;
pub mod delete;
pub mod edit;
pub mod finish;
pub mod list;
pub mod show;
pub mod sync;
