// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation for runs, jobs, and queue messages.
//!
//! Generated IDs are time-prefixed (`{prefix}{epoch_ms}-{rand}`) so they
//! sort roughly by creation time in any store that orders keys
//! lexicographically. Caller-supplied IDs of any shape are accepted
//! unchanged (the worker API lets callers bring their own job ids).

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Number of random characters appended after the epoch-ms segment.
pub const ID_RAND_LEN: usize = 9;

/// Define a newtype ID wrapper with a type prefix.
///
/// Generates `generate(epoch_ms)` for time-prefixed random IDs,
/// `from_string()` for caller-supplied IDs, `as_str()`, `short()`,
/// `Display`, `From<String>`, `From<&str>`, `PartialEq<str>`,
/// `Borrow<str>`, and `Deref` implementations.
///
/// The generated format is `{prefix}{epoch_ms}-{rand}` where:
/// - `prefix`: type indicator (e.g. "run-", "job-")
/// - `epoch_ms`: creation time in milliseconds since the epoch
/// - `rand`: [`ID_RAND_LEN`] random nanoid characters
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct JobId("job-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new time-prefixed random ID.
            pub fn generate(epoch_ms: u64) -> Self {
                Self(format!(
                    "{}{}-{}",
                    Self::PREFIX,
                    epoch_ms,
                    nanoid::nanoid!({ $crate::id::ID_RAND_LEN })
                ))
            }

            /// Wrap an existing string (for parsing/deserialization and
            /// caller-supplied ids).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::short(&self.0, n)
            }

            /// Returns true if the ID is an empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self::from_string(s.clone())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

crate::define_id! {
    /// Unique identifier for a workflow run.
    ///
    /// Returned from start and used to query status while the run spans
    /// pauses, timers, and worker round-trips.
    pub struct RunId("run-");
}

crate::define_id! {
    /// Unique identifier for a worker job.
    ///
    /// Callers may supply their own job id at dispatch time; generated ids
    /// follow the time-prefixed format.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Identifier assigned to an enqueued message.
    pub struct MessageId("msg-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
