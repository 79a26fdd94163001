//! dcexec Worker
//!
//! The remote half of dcexec: accepts uploaded binaries, runs them with the
//! stdin (and argv) a client sends, returns their stdout, and deletes them
//! again when asked or when it shuts down.
//!
//! Workers also hold string values under keys for clients, and can write a
//! value to a file in the storage directory for the programs they run.

pub mod config;
pub mod server;
pub mod store;
pub mod worker;

pub use config::WorkerConfig;
pub use server::WorkerServer;
pub use store::DataStore;
pub use worker::Worker;
