// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opaque handles carried through graph slots.
//!
//! The graph never looks inside these. They are created by whoever owns the
//! actual GPU objects or scene entities and only travel between nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random handle
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0.simple())
            }
        }
    };
}

opaque_handle!(
    /// Handle to a GPU buffer
    BufferId
);

opaque_handle!(
    /// Handle to a texture view
    TextureViewId
);

opaque_handle!(
    /// Handle to a sampler
    SamplerId
);

opaque_handle!(
    /// Reference to a scene entity (for example the camera a view renders from)
    EntityId
);
