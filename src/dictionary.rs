//! The object dictionary: a keyed cache of the most recently observed (or
//! locally declared) object values, with size-inference rules matching the
//! wire behavior of expedited SDO and PDO transfers.

use std::collections::BTreeMap;

use crate::error::CanOpenError;
use crate::frame::{LittleEndian, Timestamp};

#[derive(Debug, Clone, Copy)]
struct ObjectValue {
    data: [u8; 4],
    size: u8,
    known_size: bool,
    last_update: Timestamp,
}

impl ObjectValue {
    fn declared(size: u8) -> Self {
        ObjectValue {
            data: [0; 4],
            size,
            known_size: true,
            last_update: Timestamp::NULL,
        }
    }
}

/// Cache of `(objectId, subId) -> {bytes, size, knownSize, lastUpdate}`.
///
/// Entries are created either explicitly by [`Dictionary::declare`], or
/// implicitly the first time the engine observes a value for an identifier
/// it doesn't yet know about. Reads always copy out; nothing here hands out
/// a reference to a stored buffer.
#[derive(Debug, Default, Clone)]
pub struct Dictionary {
    entries: BTreeMap<(u16, u8), ObjectValue>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }

    /// Declares an object of the given size, overwriting any previous entry.
    /// The new entry is unread (`timestamp` is null) until something writes
    /// to it.
    pub fn declare(&mut self, object_id: u16, sub_id: u8, size: u8) {
        self.entries
            .insert((object_id, sub_id), ObjectValue::declared(size));
    }

    pub fn has(&self, object_id: u16, sub_id: u8) -> bool {
        self.size_of(object_id, sub_id) > 0
    }

    pub fn size_of(&self, object_id: u16, sub_id: u8) -> u8 {
        self.entries
            .get(&(object_id, sub_id))
            .map(|v| v.size)
            .unwrap_or(0)
    }

    /// `true` once the entry exists and has a pinned size (set either via
    /// [`Dictionary::declare`] or a prior typed [`Dictionary::get`]).
    pub fn known_size(&self, object_id: u16, sub_id: u8) -> bool {
        self.entries
            .get(&(object_id, sub_id))
            .map(|v| v.known_size)
            .unwrap_or(false)
    }

    pub fn timestamp(&self, object_id: u16, sub_id: u8) -> Timestamp {
        self.entries
            .get(&(object_id, sub_id))
            .map(|v| v.last_update)
            .unwrap_or(Timestamp::NULL)
    }

    /// Copies the stored bytes into `out`, returning the number of bytes
    /// copied. Returns `0` if the entry is absent or declared-but-unread.
    pub fn get_raw(&self, object_id: u16, sub_id: u8, out: &mut [u8]) -> Result<usize, CanOpenError> {
        let Some(value) = self.entries.get(&(object_id, sub_id)) else {
            return Ok(0);
        };
        if value.last_update.is_null() {
            return Ok(0);
        }
        let size = value.size as usize;
        if out.len() < size {
            return Err(CanOpenError::BufferSizeTooSmall {
                capacity: out.len(),
                needed: size,
            });
        }
        out[..size].copy_from_slice(&value.data[..size]);
        Ok(size)
    }

    /// Writes an observed value straight through, bypassing the `set<T>`
    /// non-null-timestamp check. Used by the state machine when ingesting
    /// frames, where the size and known-size bookkeeping has already been
    /// worked out against the classification rules.
    pub(crate) fn write_raw(
        &mut self,
        object_id: u16,
        sub_id: u8,
        data: &[u8],
        size: u8,
        known_size: bool,
        time: Timestamp,
    ) {
        let entry = self
            .entries
            .entry((object_id, sub_id))
            .or_insert_with(|| ObjectValue {
                data: [0; 4],
                size,
                known_size,
                last_update: Timestamp::NULL,
            });
        entry.data = [0; 4];
        entry.data[..data.len()].copy_from_slice(data);
        entry.size = size;
        entry.known_size = known_size;
        entry.last_update = time;
    }

    /// Writes the little-endian encoding of `value`, pinning the entry's
    /// size to `T::SIZE`. `time` must be non-null.
    pub fn set<T: LittleEndian>(
        &mut self,
        object_id: u16,
        sub_id: u8,
        value: T,
        time: Timestamp,
    ) -> Result<(), CanOpenError> {
        if time.is_null() {
            return Err(CanOpenError::InvalidArgument(
                "set requires a non-null timestamp".to_string(),
            ));
        }
        let mut buf = [0u8; 4];
        value.encode_le(&mut buf);
        self.write_raw(object_id, sub_id, &buf[..T::SIZE], T::SIZE as u8, true, time);
        Ok(())
    }

    /// Typed read. Fails with [`CanOpenError::ObjectNotRead`] if the entry
    /// doesn't exist or has never been written to. On a known-size entry,
    /// fails with [`CanOpenError::InvalidObjectType`] if `T`'s width doesn't
    /// match the stored size. On an entry whose size isn't yet known (an
    /// object first observed through an unknown-size SDO upload reply),
    /// pins the size to `T::SIZE` as a side effect.
    pub fn get<T: LittleEndian>(&mut self, object_id: u16, sub_id: u8) -> Result<T, CanOpenError> {
        let entry = self
            .entries
            .get_mut(&(object_id, sub_id))
            .ok_or(CanOpenError::ObjectNotRead { object_id, sub_id })?;
        if entry.last_update.is_null() {
            return Err(CanOpenError::ObjectNotRead { object_id, sub_id });
        }
        if entry.known_size {
            if entry.size as usize != T::SIZE {
                return Err(CanOpenError::InvalidObjectType {
                    object_id,
                    sub_id,
                    known: entry.size,
                    requested: T::SIZE as u8,
                });
            }
        } else {
            entry.size = T::SIZE as u8;
            entry.known_size = true;
        }
        Ok(T::decode_le(&entry.data[..T::SIZE]))
    }
}
