//! Retarget Settings
//!
//! Policy flags that shape how a [`RetargetSession`](crate::RetargetSession)
//! synthesizes constraints.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bonecopy::{RetargetSession, RetargetSettings, SkeletonId};
//!
//! // Default: preview on, offsets computed on assign and snapped to 90°
//! let settings = RetargetSettings::default();
//!
//! // Keep fine misalignment instead of snapping it away
//! let settings = RetargetSettings {
//!     quantize_offset: false,
//!     ..Default::default()
//! };
//!
//! let session = RetargetSession::with_settings(SkeletonId::new("Rig"), settings);
//! ```

use serde::{Deserialize, Serialize};

/// Session-wide policy flags.
///
/// | Flag                    | Default | Effect                                              |
/// |-------------------------|---------|-----------------------------------------------------|
/// | `preview`               | `true`  | Valid constraints are enabled                       |
/// | `calc_offset_on_assign` | `true`  | Assigning a target bone derives the rotation offset |
/// | `quantize_offset`       | `true`  | Derived offsets snap to multiples of 90°            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetSettings {
    /// When `false`, every synthesized constraint is disabled so the raw
    /// pose can be inspected. The mapping graph is left intact.
    pub preview: bool,

    /// Compute the rotation offset from the rest/current world transforms
    /// whenever a mapping's target bone is assigned.
    pub calc_offset_on_assign: bool,

    /// Round each computed offset axis to the nearest right angle.
    pub quantize_offset: bool,
}

impl Default for RetargetSettings {
    fn default() -> Self {
        Self {
            preview: true,
            calc_offset_on_assign: true,
            quantize_offset: true,
        }
    }
}
