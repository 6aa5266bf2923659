pub mod document;
pub mod error;
pub mod http;
pub mod kv;
pub mod queue;
pub mod sinkfile;
pub mod sql;
pub mod warehouse;
