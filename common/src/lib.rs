pub mod address;
pub mod clock;
pub mod config;
pub mod error;
pub mod messages;
pub mod models;
pub mod utils;

pub use address::*;
pub use clock::*;
pub use self::config::*;
pub use error::*;
pub use messages::*;
pub use utils::*;
