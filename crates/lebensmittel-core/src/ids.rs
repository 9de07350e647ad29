//! Typed identifiers.
//!
//! Every id is an opaque string on the wire and in SQLite. The wrappers only
//! keep a group id from being passed where a user or connection is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// The id as stored and sent.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

macro_rules! generated {
    ($($name:ident),+) => {
        $(
            impl $name {
                /// Mint a fresh UUID v7 id.
                #[must_use]
                pub fn generate() -> Self {
                    Self(Uuid::now_v7().to_string())
                }
            }
        )+
    };
}

string_id! {
    /// Subject of an access token. Never minted here.
    UserId
}

string_id! {
    /// A household. Ordered so per-group reports list groups by id.
    #[derive(PartialOrd, Ord)]
    GroupId
}

string_id! {
    /// One live websocket connection.
    ConnectionId
}

string_id! {
    /// Key of a grocery item, meal plan, or receipt.
    RecordId
}

generated!(GroupId, ConnectionId, RecordId);
