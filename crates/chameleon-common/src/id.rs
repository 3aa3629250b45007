use serde::{Deserialize, Serialize};
use std::fmt;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a client identifier of the form `user_<9 base36 chars>`.
pub fn new_client_id() -> String {
    let mut n = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    format!("user_{suffix}")
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Key of a chat session record, assigned by the store.
    SessionId
);
string_id!(
    /// Stable per-device identity of a client.
    ClientId
);
string_id!(
    /// Key of a message within a session's message list.
    MessageId
);

impl ClientId {
    pub fn generate() -> Self {
        Self(new_client_id())
    }
}
