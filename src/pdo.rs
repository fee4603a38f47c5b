//! PDO mapping model and PDO configuration message builder.

use std::time::Duration;

use crate::error::CanOpenError;
use crate::frame::{Frame, LittleEndian};
use crate::sdo;

/// `MAX_PDO = 4`: the original source declares 3 but indexes 0..3
/// inclusive; this fixes the discrepancy rather than reproducing it.
pub const MAX_PDO: usize = 4;

/// One entry of a [`PdoMapping`]: an object that occupies `byte_size`
/// consecutive bytes of the PDO's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedObject {
    pub object_id: u16,
    pub sub_id: u8,
    pub byte_size: u8,
}

/// An ordered list of mapped objects whose cumulative byte size fits a
/// single 8-byte CAN frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdoMapping {
    entries: Vec<MappedObject>,
    current_size: u8,
}

impl PdoMapping {
    pub fn new() -> PdoMapping {
        PdoMapping::default()
    }

    /// Appends a mapped object. Fails with
    /// [`CanOpenError::PdoMappingTooBig`] if the cumulative size would
    /// exceed 8 bytes.
    pub fn add(&mut self, object_id: u16, sub_id: u8, byte_size: u8) -> Result<(), CanOpenError> {
        if self.current_size + byte_size > 8 {
            return Err(CanOpenError::PdoMappingTooBig);
        }
        self.entries.push(MappedObject {
            object_id,
            sub_id,
            byte_size,
        });
        self.current_size += byte_size;
        Ok(())
    }

    pub fn empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MappedObject] {
        &self.entries
    }

    pub fn total_size(&self) -> u8 {
        self.current_size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionMode {
    Synchronous,
    SynchronousRtrOnly,
    AsynchronousRtrOnly,
    Asynchronous,
}

/// Configuration for one PDO's communication parameter object (`0x1400+n`
/// / `0x1800+n`). `inhibit_time` and `timer_period` only apply to
/// asynchronous transmit PDOs; they are ignored otherwise.
#[derive(Debug, Clone, Copy)]
pub struct PdoCommunicationParameters {
    pub transmission_mode: TransmissionMode,
    /// `0` selects the default COB-ID for the PDO's role, node and index.
    pub cob_id: u32,
    /// Only meaningful when `transmission_mode == Synchronous`; 0..=251.
    pub sync_period: u8,
    pub inhibit_time: Duration,
    pub timer_period: Duration,
}

impl Default for PdoCommunicationParameters {
    fn default() -> PdoCommunicationParameters {
        PdoCommunicationParameters {
            transmission_mode: TransmissionMode::Asynchronous,
            cob_id: 0,
            sync_period: 0,
            inhibit_time: Duration::ZERO,
            timer_period: Duration::ZERO,
        }
    }
}

pub fn parameter_object_id(transmit: bool, n: u8) -> u16 {
    if transmit {
        0x1800 + n as u16
    } else {
        0x1400 + n as u16
    }
}

pub fn mapping_object_id(transmit: bool, n: u8) -> u16 {
    if transmit {
        0x1A00 + n as u16
    } else {
        0x1600 + n as u16
    }
}

/// `FUNCTION_PDO{n}_TRANSMIT + nodeId` for transmit PDOs, `0x200 + (n <<
/// 8) + nodeId` for receive PDOs.
pub fn default_cob_id(transmit: bool, n: u8, node_id: u8) -> u32 {
    let base: u32 = if transmit { 0x180 } else { 0x200 };
    base + (n as u32) * 0x100 + node_id as u32
}

fn download<T: LittleEndian>(node_id: u8, object_id: u16, sub_id: u8, value: T) -> Frame {
    let mut buf = [0u8; 4];
    value.encode_le(&mut buf);
    sdo::make_initiate_domain_download(node_id, object_id, sub_id, &buf[..T::SIZE], true)
        .expect("fixed-width PDO configuration value always encodes to 1..=4 bytes")
}

fn ticks_100us(d: Duration) -> Result<u16, CanOpenError> {
    let ticks = d.as_micros() / 100;
    u16::try_from(ticks)
        .map_err(|_| CanOpenError::InvalidArgument(format!("inhibit time {d:?} exceeds 6.5536s")))
}

fn millis(d: Duration) -> Result<u16, CanOpenError> {
    u16::try_from(d.as_millis())
        .map_err(|_| CanOpenError::InvalidArgument(format!("timer period {d:?} exceeds 65.536s")))
}

/// Builds the communication-parameters configuration sequence: COB-ID,
/// transmission mode, and (for asynchronous transmit PDOs) inhibit time
/// and event timer period.
pub fn make_pdo_communication_parameters_messages(
    transmit: bool,
    node_id: u8,
    n: u8,
    params: &PdoCommunicationParameters,
) -> Result<Vec<Frame>, CanOpenError> {
    let object_id = parameter_object_id(transmit, n);
    let cob_id = if params.cob_id == 0 {
        default_cob_id(transmit, n, node_id)
    } else {
        params.cob_id
    };

    let mut frames = vec![download(node_id, object_id, 1, cob_id)];

    let transmission_byte = match params.transmission_mode {
        TransmissionMode::Synchronous => {
            if params.sync_period > 251 {
                return Err(CanOpenError::InvalidArgument(format!(
                    "sync period {} exceeds 251",
                    params.sync_period
                )));
            }
            params.sync_period
        }
        TransmissionMode::SynchronousRtrOnly => 252,
        TransmissionMode::AsynchronousRtrOnly => 253,
        TransmissionMode::Asynchronous => 254,
    };
    frames.push(download(node_id, object_id, 2, transmission_byte));

    if transmit
        && matches!(
            params.transmission_mode,
            TransmissionMode::AsynchronousRtrOnly | TransmissionMode::Asynchronous
        )
    {
        frames.push(download(node_id, object_id, 3, ticks_100us(params.inhibit_time)?));
        frames.push(download(node_id, object_id, 5, millis(params.timer_period)?));
    }

    Ok(frames)
}

/// Builds the mapping configuration sequence: clear the mapping count,
/// write each mapped entry, then set the mapping count.
pub fn make_pdo_mapping_messages(transmit: bool, node_id: u8, n: u8, mapping: &PdoMapping) -> Vec<Frame> {
    let object_id = mapping_object_id(transmit, n);
    let mut frames = vec![download(node_id, object_id, 0, 0u32)];
    for (i, entry) in mapping.entries().iter().enumerate() {
        let sub_id = (i + 1) as u8;
        let value = (entry.object_id as u32) << 16 | (entry.sub_id as u32) << 8 | (entry.byte_size as u32 * 8);
        frames.push(download(node_id, object_id, sub_id, value));
    }
    frames.push(download(node_id, object_id, 0, mapping.entries().len() as u32));
    frames
}

/// Writes the COB-ID sub-index with bit 31 (disable) set, and bit 30 also
/// set when `quirk_reserved_bit` is on.
pub fn disable_pdo_message(transmit: bool, node_id: u8, n: u8, cob_id: u32, quirk_reserved_bit: bool) -> Frame {
    let mut value = cob_id | 0x8000_0000;
    if quirk_reserved_bit {
        value |= 0x4000_0000;
    }
    download(node_id, parameter_object_id(transmit, n), 1, value)
}

/// The full reconfiguration sequence: disable, reconfigure communication
/// parameters and mapping, then re-enable. When `quirk_reserved_bit` is
/// set, bit 30 of the COB-ID is carried through both the disable frame and
/// the final re-enable frame, matching devices that reserve it.
pub fn make_pdo_configuration_messages(
    transmit: bool,
    node_id: u8,
    n: u8,
    params: &PdoCommunicationParameters,
    mapping: &PdoMapping,
    quirk_reserved_bit: bool,
) -> Result<Vec<Frame>, CanOpenError> {
    let cob_id = if params.cob_id == 0 {
        default_cob_id(transmit, n, node_id)
    } else {
        params.cob_id
    };

    let mut frames = make_pdo_communication_parameters_messages(transmit, node_id, n, params)?;
    frames[0] = disable_pdo_message(transmit, node_id, n, cob_id, quirk_reserved_bit);
    frames.extend(make_pdo_mapping_messages(transmit, node_id, n, mapping));

    let enable_value = if quirk_reserved_bit { cob_id | 0x4000_0000 } else { cob_id };
    frames.push(download(node_id, parameter_object_id(transmit, n), 1, enable_value));

    Ok(frames)
}
