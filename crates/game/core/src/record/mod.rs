//! Networked data record: the fixed 32-byte representation of one modifier
//! instance.
//!
//! # Wire Layout
//!
//! ```text
//! offset  size  field
//! 0       1     behavior index + 1   (0 = no behavior assigned)
//! 1       1     prefab index + 1     (0 = whole record invalid/free)
//! 2       2     target index + 1, LE (0 = unset)
//! 4       28    payload, interpreted by the owning behavior
//! ```
//!
//! The header stores raw wire values; accessors translate the +1 sentinel
//! encoding into `Option`s. The payload carries no discriminant of its own:
//! the behavior index is the sole tag.

mod payload;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::config::ModConfig;
use crate::error::{ErrorSeverity, ModError};

pub use payload::{PayloadBytes, PayloadLayout, PayloadReader, PayloadWriter};

/// Index of a behavior in the [`ModRegistry`](crate::ModRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BehaviorIndex(pub u8);

impl fmt::Display for BehaviorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "behavior[{}]", self.0)
    }
}

/// Header field named in a [`RecordError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecordField {
    Behavior,
    Prefab,
    Target,
}

/// Errors raised while constructing or parsing records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// An index does not fit its header field once the unset sentinel is reserved.
    #[error("{field} index {value} exceeds maximum {max}")]
    Range {
        field: RecordField,
        value: u32,
        max: u32,
    },

    #[error("record buffer is {len} bytes, expected {expected}")]
    Length { len: usize, expected: usize },
}

impl ModError for RecordError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Range { .. } => "RECORD_RANGE",
            Self::Length { .. } => "RECORD_LENGTH",
        }
    }
}

/// One attached modifier instance, byte-compatible with the wire layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Record {
    behavior: u8,
    prefab: u8,
    target: u16,
    payload: PayloadBytes,
}

impl Record {
    /// A free slot: invalid, unassigned, zero payload.
    pub const EMPTY: Self = Self {
        behavior: 0,
        prefab: 0,
        target: 0,
        payload: [0; ModConfig::PAYLOAD_SIZE],
    };

    /// Builds a valid record with a zeroed payload.
    ///
    /// # Errors
    ///
    /// [`RecordError::Range`] if an index equals the width maximum, which is
    /// unrepresentable once value 0 is reserved as "unset".
    pub fn encode(
        behavior: Option<BehaviorIndex>,
        prefab: u8,
        target: u16,
    ) -> Result<Self, RecordError> {
        let mut record = Self::EMPTY;
        record.set_behavior(behavior)?;
        record.prefab = encode_u8(RecordField::Prefab, prefab, ModConfig::MAX_PREFAB_INDEX)?;
        record.set_target_index(target)?;
        Ok(record)
    }

    /// Parses the 32-byte wire form. Every bit pattern is a well-formed record.
    pub fn from_bytes(bytes: &[u8; ModConfig::RECORD_SIZE]) -> Self {
        let mut payload = [0u8; ModConfig::PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[ModConfig::HEADER_SIZE..]);
        Self {
            behavior: bytes[0],
            prefab: bytes[1],
            target: u16::from_le_bytes([bytes[2], bytes[3]]),
            payload,
        }
    }

    /// Parses a record from a buffer of unchecked length.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, RecordError> {
        let bytes: &[u8; ModConfig::RECORD_SIZE] =
            bytes.try_into().map_err(|_| RecordError::Length {
                len: bytes.len(),
                expected: ModConfig::RECORD_SIZE,
            })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Serializes to the 32-byte wire form.
    pub fn to_bytes(&self) -> [u8; ModConfig::RECORD_SIZE] {
        let mut bytes = [0u8; ModConfig::RECORD_SIZE];
        bytes[0] = self.behavior;
        bytes[1] = self.prefab;
        bytes[2..4].copy_from_slice(&self.target.to_le_bytes());
        bytes[ModConfig::HEADER_SIZE..].copy_from_slice(&self.payload);
        bytes
    }

    pub fn behavior_index(&self) -> Option<BehaviorIndex> {
        self.behavior.checked_sub(1).map(BehaviorIndex)
    }

    pub fn prefab_index(&self) -> Option<u8> {
        self.prefab.checked_sub(1)
    }

    pub fn target_index(&self) -> Option<u16> {
        self.target.checked_sub(1)
    }

    pub fn set_behavior(&mut self, behavior: Option<BehaviorIndex>) -> Result<(), RecordError> {
        self.behavior = match behavior {
            Some(index) => encode_u8(RecordField::Behavior, index.0, ModConfig::MAX_BEHAVIOR_INDEX)?,
            None => 0,
        };
        Ok(())
    }

    pub fn set_target_index(&mut self, target: u16) -> Result<(), RecordError> {
        if target > ModConfig::MAX_TARGET_INDEX {
            return Err(RecordError::Range {
                field: RecordField::Target,
                value: u32::from(target),
                max: u32::from(ModConfig::MAX_TARGET_INDEX),
            });
        }
        self.target = target + 1;
        Ok(())
    }

    /// A record is valid while its prefab binding is set.
    pub fn is_valid(&self) -> bool {
        self.prefab != 0
    }

    /// True when a behavior owns this record.
    pub fn is_assigned(&self) -> bool {
        self.behavior != 0
    }

    /// Marks the whole slot free.
    pub fn invalidate(&mut self) {
        self.prefab = 0;
    }

    /// Strips the behavior but keeps the prefab binding; the slot stays
    /// allocated and inert.
    pub fn detach_behavior(&mut self) {
        self.behavior = 0;
        self.target = 0;
    }

    pub fn payload(&self) -> &PayloadBytes {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut PayloadBytes {
        &mut self.payload
    }

    #[must_use]
    pub fn with_payload(mut self, payload: PayloadBytes) -> Self {
        self.payload = payload;
        self
    }

    /// Decodes the payload as layout `P`.
    ///
    /// No tag check is performed: callers only view a record through the
    /// layout of the behavior named by its `behavior_index`.
    pub fn view_as<P: PayloadLayout>(&self) -> P {
        P::decode(&self.payload)
    }

    /// Mutable view of the payload as layout `P`, written back when dropped.
    pub fn view_mut_as<P: PayloadLayout>(&mut self) -> PayloadMut<'_, P> {
        let value = P::decode(&self.payload);
        PayloadMut {
            record: self,
            value,
        }
    }

    /// Encodes `value` into the payload; bytes past `P::SIZE` are preserved.
    pub fn store<P: PayloadLayout>(&mut self, value: &P) {
        value.encode_into(&mut self.payload);
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Guard returned by [`Record::view_mut_as`].
pub struct PayloadMut<'a, P: PayloadLayout> {
    record: &'a mut Record,
    value: P,
}

impl<P: PayloadLayout> Deref for PayloadMut<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.value
    }
}

impl<P: PayloadLayout> DerefMut for PayloadMut<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.value
    }
}

impl<P: PayloadLayout> Drop for PayloadMut<'_, P> {
    fn drop(&mut self) {
        self.value.encode_into(&mut self.record.payload);
    }
}

fn encode_u8(field: RecordField, value: u8, max: u8) -> Result<u8, RecordError> {
    if value > max {
        return Err(RecordError::Range {
            field,
            value: u32::from(value),
            max: u32::from(max),
        });
    }
    Ok(value + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq)]
    struct Countdown {
        remaining: u16,
        armed: bool,
    }

    impl PayloadLayout for Countdown {
        const SIZE: usize = 3;

        fn read(reader: &mut PayloadReader<'_>) -> Self {
            Self {
                remaining: reader.u16(),
                armed: reader.bool(),
            }
        }

        fn write(&self, writer: &mut PayloadWriter<'_>) {
            writer.u16(self.remaining);
            writer.bool(self.armed);
        }
    }

    #[test]
    fn wire_layout_is_plus_one_little_endian() {
        let record = Record::encode(Some(BehaviorIndex(2)), 0, 0x0102).unwrap();
        let bytes = record.to_bytes();
        assert_eq!(hex::encode(&bytes[..4]), "03010301");
        assert!(bytes[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn encode_rejects_reserved_maxima() {
        assert_eq!(
            Record::encode(Some(BehaviorIndex(255)), 0, 0),
            Err(RecordError::Range {
                field: RecordField::Behavior,
                value: 255,
                max: 254
            })
        );
        assert!(matches!(
            Record::encode(None, 255, 0),
            Err(RecordError::Range {
                field: RecordField::Prefab,
                ..
            })
        ));
        assert!(matches!(
            Record::encode(None, 0, u16::MAX),
            Err(RecordError::Range {
                field: RecordField::Target,
                ..
            })
        ));
        assert!(Record::encode(Some(BehaviorIndex(254)), 254, 65534).is_ok());
    }

    #[test]
    fn unassigned_record_is_still_valid() {
        let record = Record::encode(None, 3, 9).unwrap();
        assert!(record.is_valid());
        assert!(!record.is_assigned());
        assert_eq!(record.behavior_index(), None);
        assert_eq!(record.prefab_index(), Some(3));
    }

    #[test]
    fn invalidate_and_detach() {
        let mut record = Record::encode(Some(BehaviorIndex(4)), 1, 7).unwrap();
        record.detach_behavior();
        assert_eq!(record.behavior_index(), None);
        assert_eq!(record.target_index(), None);
        assert!(record.is_valid());

        record.invalidate();
        assert!(!record.is_valid());
        assert_eq!(record, Record::from_bytes(&record.to_bytes()));
    }

    #[test]
    fn empty_record_is_invalid() {
        assert!(!Record::EMPTY.is_valid());
        assert!(!Record::default().is_assigned());
    }

    #[test]
    fn try_from_slice_checks_length() {
        assert_eq!(
            Record::try_from_slice(&[0u8; 31]),
            Err(RecordError::Length {
                len: 31,
                expected: 32
            })
        );
        assert!(Record::try_from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn mutable_view_writes_back_and_preserves_tail() {
        let mut payload = [0u8; ModConfig::PAYLOAD_SIZE];
        payload[27] = 0x5A;
        let mut record = Record::encode(Some(BehaviorIndex(0)), 0, 0)
            .unwrap()
            .with_payload(payload);

        {
            let mut view = record.view_mut_as::<Countdown>();
            view.remaining = 300;
            view.armed = true;
        }

        assert_eq!(
            record.view_as::<Countdown>(),
            Countdown {
                remaining: 300,
                armed: true
            }
        );
        assert_eq!(record.payload()[27], 0x5A);
    }

    proptest! {
        #[test]
        fn round_trip_preserves_fields(
            behavior in proptest::option::of(0u8..=254),
            prefab in 0u8..=254,
            target in 0u16..=65534,
            payload in proptest::array::uniform28(any::<u8>()),
        ) {
            let record = Record::encode(behavior.map(BehaviorIndex), prefab, target)
                .unwrap()
                .with_payload(payload);
            let decoded = Record::from_bytes(&record.to_bytes());

            prop_assert_eq!(decoded.behavior_index(), behavior.map(BehaviorIndex));
            prop_assert_eq!(decoded.prefab_index(), Some(prefab));
            prop_assert_eq!(decoded.target_index(), Some(target));
            prop_assert_eq!(decoded.payload(), &payload);
        }
    }
}
