//! Mapping presets
//!
//! A preset is the portable part of a session: which owner bone maps onto
//! which target bone, and the per-mapping features and offsets. It carries no
//! skeleton identifiers, so one preset can be replayed onto any pair of rigs
//! that share bone names.
//!
//! ```rust,ignore
//! let json = MappingPreset::from_session(&session).to_json()?;
//! // ... later, on another rig pair
//! let preset = MappingPreset::from_json(&json)?;
//! other_session.apply_preset(&mut host, &preset)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::host::ConstraintHost;
use crate::mapping::Feature;
use crate::session::RetargetSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub owner_bone: String,
    pub target_bone: String,
    /// `Some` iff the rotation-offset feature is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_offset: Option<[f32; 3]>,
    #[serde(default)]
    pub location_copy: bool,
    #[serde(default)]
    pub ik: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingPreset {
    pub entries: Vec<PresetEntry>,
}

impl MappingPreset {
    /// Captures the session's mappings in collection order.
    #[must_use]
    pub fn from_session(session: &RetargetSession) -> Self {
        let entries = session
            .mappings()
            .iter()
            .map(|m| PresetEntry {
                owner_bone: m.owner_bone().to_owned(),
                target_bone: m.target_bone().to_owned(),
                rotation_offset: m
                    .has_feature(Feature::RotationOffset)
                    .then(|| m.offset().to_array()),
                location_copy: m.has_feature(Feature::LocationCopy),
                ik: m.has_feature(Feature::Ik),
            })
            .collect();
        Self { entries }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl RetargetSession {
    /// Replays a preset: each entry goes through [`add_mapping`](Self::add_mapping)
    /// (appending new owner bones, re-targeting known ones), then its features
    /// and offset are forced to the preset's values.
    ///
    /// Returns the number of entries applied.
    pub fn apply_preset<H: ConstraintHost + ?Sized>(&mut self, host: &mut H, preset: &MappingPreset) -> Result<usize> {
        for entry in &preset.entries {
            let index = self.add_mapping(host, &entry.owner_bone, &entry.target_bone, Some(self.len()))?;

            self.set_feature(host, index, Feature::LocationCopy, entry.location_copy)?;
            self.set_feature(host, index, Feature::Ik, entry.ik)?;
            match entry.rotation_offset {
                Some(euler) => {
                    self.set_offset(host, index, euler.into())?;
                    self.set_feature(host, index, Feature::RotationOffset, true)?;
                }
                None => self.set_feature(host, index, Feature::RotationOffset, false)?,
            }
        }

        log::debug!("Applied preset with {} entries to {}", preset.entries.len(), self.owner());
        Ok(preset.entries.len())
    }
}
