use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
    };
}

define_id!(
    /// Identifier of an image.
    ViewId
);
define_id!(
    /// Identifier of a camera pose. Several views may share one pose.
    PoseId
);
define_id!(
    /// Identifier of a camera intrinsic. Several views may share one intrinsic.
    IntrinsicId
);
define_id!(
    /// Identifier of a 3D landmark.
    LandmarkId
);
