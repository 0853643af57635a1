//! Skeletal animation retargeting through pose constraints.
//!
//! Instead of baking animation from one armature into another, `bonecopy`
//! keeps a graph of per-bone constraints on the *owner* skeleton that make it
//! follow a *target* skeleton. A host baking pass can then sample the
//! corrected pose.
//!
//! - [`RetargetSession`]: the ordered set of bone mappings for one skeleton pair
//! - [`BoneMapping`]: one owner ↔ target correspondence and its constraints
//! - [`ConstraintHost`]: the contract the host pose system implements
//! - [`math`]: setup-time rotation offset computation

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod settings;
pub mod math;
pub mod host;
pub mod mapping;
pub mod session;
pub mod preset;

pub use errors::{RetargetError, Result};
pub use settings::RetargetSettings;
pub use host::{ConstraintHandle, ConstraintHost, ConstraintKind, ConstraintParams, MemoryHost, SkeletonId};
pub use mapping::{BoneMapping, Feature, RigPair};
pub use session::RetargetSession;
pub use preset::{MappingPreset, PresetEntry};
