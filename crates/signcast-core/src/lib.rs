pub mod channel;
pub mod config;
pub mod datatype;
pub mod error;
pub mod io;
pub mod media;
pub mod object_store;
pub mod paths;
pub mod schedule;
pub mod signage;
pub mod store;
pub mod template;
pub mod value;

pub use error::{Result, SigncastError};
pub use store::ContentStore;
