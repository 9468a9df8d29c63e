pub mod archive;
pub mod builder;
pub mod cleanup;
pub mod commands;
pub mod download;
pub mod error;
pub mod fetch;
pub mod http;
pub mod layout;
pub mod link;
pub mod orchestrator;
pub mod runtime;
pub mod store;
pub mod toolchain;
pub mod version;

pub use error::{Error, ErrorKind, Result};
pub use version::PythonVersion;
