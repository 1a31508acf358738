// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for the wire-facing enums and fluent option
//! structs used across the runtime.

/// Map a status-style enum to its wire names.
///
/// Run, job, and queue statuses travel as lowercase strings in stores,
/// queue messages, and redis key layouts; this generates the mapping in
/// both directions plus a `Display` impl, so the string written by one
/// backend always parses in another.
///
/// ```ignore
/// crate::wire_name! {
///     JobStatus {
///         Queued => "queued",
///         Failed => "failed",
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_name {
    ($enum:ty { $( $variant:ident => $name:literal ),+ $(,)? }) => {
        impl $enum {
            /// Stable name used in stores, messages, and key layouts.
            pub fn wire_name(&self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }

            /// Parse a wire name back to a variant.
            pub fn from_wire(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.wire_name())
            }
        }
    };
}

/// Chainable setters for option and config structs.
///
/// One line per field. `set` fields assign through `impl Into`; `opt`
/// fields are `Option`s and wrap the value in `Some`. Everything the
/// dispatcher, stores, and engine expose as request options goes through
/// this so call sites read the same everywhere.
///
/// ```ignore
/// impl DispatchOptions {
///     crate::fluent! {
///         set metadata: Map<String, Value>;
///         opt job_id: String;
///     }
/// }
/// ```
#[macro_export]
macro_rules! fluent {
    ( $( $kind:ident $field:ident : $ty:ty ;)+ ) => {
        $( $crate::fluent!(@ $kind $field $ty); )+
    };
    (@ set $field:ident $ty:ty) => {
        pub fn $field(mut self, v: impl Into<$ty>) -> Self {
            self.$field = v.into();
            self
        }
    };
    (@ opt $field:ident $ty:ty) => {
        pub fn $field(mut self, v: impl Into<$ty>) -> Self {
            self.$field = Some(v.into());
            self
        }
    };
}
