// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Numeric identifiers shared by the supervisor and its workers.

/// Define a newtype ID wrapper around an unsigned integer.
///
/// Generates `new()`, `get()`, `is_assigned()`, `Display`, and `From`
/// conversions in both directions.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId(u32);
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($inner:ty);
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            pub const fn get(self) -> $inner {
                self.0
            }

            /// Zero is reserved for "not assigned yet".
            pub const fn is_assigned(self) -> bool {
                self.0 != 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Pool-wide worker identifier. Also the worker's slot index in the
    /// state storage, so valid ids start at 1.
    pub struct WorkerId(u32);
}

define_id! {
    /// Identifier of a registered worker group, assigned in registration order.
    pub struct GroupId(u32);
}

define_id! {
    /// Identity of a pending job result. Zero marks a fire-and-forget job.
    pub struct JobId(u64);
}

impl WorkerId {
    /// Slot index of this worker inside the state region.
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

impl JobId {
    /// The id carried by jobs that expect no response.
    pub const FIRE_AND_FORGET: JobId = JobId(0);

    pub fn expects_response(self) -> bool {
        self.is_assigned()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
