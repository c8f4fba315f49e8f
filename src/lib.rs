// Library surface shared by the binary and the integration tests.
pub mod app_dirs;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod history;
pub mod messages;
pub mod policy;
pub mod reading;
pub mod runtime;
pub mod session;
pub mod speech;
pub mod stats;
pub mod store;
pub mod symbols;
pub mod writer;

pub use error::{RecognitionError, Result, TutorError};
pub use symbols::Category;
