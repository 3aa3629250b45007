pub mod errors;
pub mod id;

pub use errors::{ChameleonError, ConfigError};
pub use id::{new_client_id, ClientId, MessageId, SessionId};

pub type Result<T> = std::result::Result<T, ChameleonError>;
