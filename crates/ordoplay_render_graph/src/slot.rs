// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs.

use crate::resource::{BufferId, EntityId, SamplerId, TextureViewId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Kind of data that can flow through a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotType {
    /// GPU buffer
    Buffer,
    /// Texture view (render target, depth attachment, sampled image)
    TextureView,
    /// Texture sampler
    Sampler,
    /// Scene entity reference
    Entity,
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "Buffer",
            Self::TextureView => "TextureView",
            Self::Sampler => "Sampler",
            Self::Entity => "Entity",
        };
        f.write_str(name)
    }
}

/// Value bound to a slot at run time
///
/// The variant doubles as the type tag, so a value can never disagree with
/// the [`SlotType`] it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotValue {
    /// Buffer handle
    Buffer(BufferId),
    /// Texture view handle
    TextureView(TextureViewId),
    /// Sampler handle
    Sampler(SamplerId),
    /// Entity reference
    Entity(EntityId),
}

impl SlotValue {
    /// Get the slot type for this value
    pub fn slot_type(&self) -> SlotType {
        match self {
            Self::Buffer(_) => SlotType::Buffer,
            Self::TextureView(_) => SlotType::TextureView,
            Self::Sampler(_) => SlotType::Sampler,
            Self::Entity(_) => SlotType::Entity,
        }
    }
}

impl From<BufferId> for SlotValue {
    fn from(value: BufferId) -> Self {
        Self::Buffer(value)
    }
}

impl From<TextureViewId> for SlotValue {
    fn from(value: TextureViewId) -> Self {
        Self::TextureView(value)
    }
}

impl From<SamplerId> for SlotValue {
    fn from(value: SamplerId) -> Self {
        Self::Sampler(value)
    }
}

impl From<EntityId> for SlotValue {
    fn from(value: EntityId) -> Self {
        Self::Entity(value)
    }
}

/// Reference to a slot, either by position or by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotLabel {
    /// Positional index
    Index(usize),
    /// Slot name
    Name(Cow<'static, str>),
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl From<usize> for SlotLabel {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&'static str> for SlotLabel {
    fn from(value: &'static str) -> Self {
        Self::Name(Cow::Borrowed(value))
    }
}

impl From<String> for SlotLabel {
    fn from(value: String) -> Self {
        Self::Name(Cow::Owned(value))
    }
}

impl From<&SlotLabel> for SlotLabel {
    fn from(value: &SlotLabel) -> Self {
        value.clone()
    }
}

/// Static description of one input or output slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Slot name
    pub name: Cow<'static, str>,
    /// Data type
    pub slot_type: SlotType,
}

impl SlotInfo {
    /// Create a new slot description
    pub fn new(name: impl Into<Cow<'static, str>>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
        }
    }
}

/// Ordered list of slots, addressable by index or name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfos {
    slots: Vec<SlotInfo>,
}

impl<T: IntoIterator<Item = SlotInfo>> From<T> for SlotInfos {
    fn from(slots: T) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }
}

impl SlotInfos {
    /// Number of slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve a label to a position.
    ///
    /// Positional labels are returned as-is; callers bounds-check them.
    /// Names resolve to the first slot declared with that name.
    pub fn get_slot_index(&self, label: impl Into<SlotLabel>) -> Option<usize> {
        match label.into() {
            SlotLabel::Index(index) => Some(index),
            SlotLabel::Name(name) => self.slots.iter().position(|slot| slot.name == name),
        }
    }

    /// Get a slot by label
    pub fn get_slot(&self, label: impl Into<SlotLabel>) -> Option<&SlotInfo> {
        let index = self.get_slot_index(label)?;
        self.slots.get(index)
    }

    /// Get a mutable slot by label
    pub fn get_slot_mut(&mut self, label: impl Into<SlotLabel>) -> Option<&mut SlotInfo> {
        let index = self.get_slot_index(label)?;
        self.slots.get_mut(index)
    }

    /// Iterate over the slots in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &SlotInfo> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> SlotInfos {
        vec![
            SlotInfo::new("view", SlotType::Entity),
            SlotInfo::new("color", SlotType::TextureView),
            SlotInfo::new("color", SlotType::Buffer),
        ]
        .into()
    }

    #[test]
    fn test_lookup_by_index_and_name_share_index_space() {
        let slots = slots();
        assert_eq!(slots.get_slot_index("color"), Some(1));
        assert_eq!(slots.get_slot_index(1), Some(1));
        assert_eq!(slots.get_slot("color"), slots.get_slot(1));
    }

    #[test]
    fn test_name_lookup_returns_first_match() {
        let slots = slots();
        let slot = slots.get_slot("color").unwrap();
        assert_eq!(slot.slot_type, SlotType::TextureView);
    }

    #[test]
    fn test_missing_slots() {
        let slots = slots();
        assert_eq!(slots.get_slot_index("depth"), None);
        assert!(slots.get_slot("depth").is_none());
        // Positional labels resolve unchecked but the slot lookup is bounded
        assert_eq!(slots.get_slot_index(7), Some(7));
        assert!(slots.get_slot(7).is_none());
    }

    #[test]
    fn test_slot_value_type_tag() {
        assert_eq!(SlotValue::from(BufferId::new()).slot_type(), SlotType::Buffer);
        assert_eq!(SlotValue::from(TextureViewId::new()).slot_type(), SlotType::TextureView);
        assert_eq!(SlotValue::from(SamplerId::new()).slot_type(), SlotType::Sampler);
        assert_eq!(SlotValue::from(EntityId::new()).slot_type(), SlotType::Entity);
    }

    #[test]
    fn test_slot_infos_serialize() {
        let slots = slots();
        let text = ron::to_string(&slots).unwrap();
        let loaded: SlotInfos = ron::from_str(&text).unwrap();
        assert_eq!(loaded, slots);
    }
}
