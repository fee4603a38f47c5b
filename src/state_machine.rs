//! The state machine: orchestrates the NMT, emergency, SDO and PDO codecs
//! against a single remote node's object dictionary, and classifies every
//! received frame into an [`Update`].

use crate::dictionary::Dictionary;
use crate::emergency::{self, Emergency};
use crate::error::CanOpenError;
use crate::frame::{self, Frame, LittleEndian, Timestamp};
use crate::nmt::{self, NodeState, NodeStateTransition};
use crate::pdo::{self, PdoCommunicationParameters, PdoMapping, MAX_PDO};
use crate::sdo;

pub const ERROR_REGISTER_OBJECT_ID: u16 = 0x1001;
pub const ERROR_REGISTER_SUB_ID: u8 = 0;
pub const PRODUCER_HEARTBEAT_TIME_OBJECT_ID: u16 = 0x1017;
pub const PRODUCER_HEARTBEAT_TIME_SUB_ID: u8 = 0;

/// Classification of a single call to [`StateMachine::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    IgnoredMessage,
    NotForMe,
    Pdo,
    PdoUnexpected,
    Sdo,
    SdoInitiateDownload,
    SdoIgnoredCommand,
    SdoUnknownCommand,
    Heartbeat,
    EmergencyNoError,
}

/// The result of processing one inbound frame: what kind of message it
/// was, and which dictionary entries it updated, in the order they were
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub mode: UpdateMode,
    pub updated: Vec<(u16, u8)>,
}

impl Update {
    fn new(mode: UpdateMode) -> Update {
        Update {
            mode,
            updated: Vec::new(),
        }
    }

    fn single(mode: UpdateMode, object_id: u16, sub_id: u8) -> Update {
        Update {
            mode,
            updated: vec![(object_id, sub_id)],
        }
    }
}

/// Per-device deviations from the specification, accepted behind an
/// opt-in flag rather than baked into the default wire behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks(pub u64);

impl Quirks {
    /// `disablePDOMessage`/the re-enable frame also carry bit 30 of the
    /// COB-ID, for devices that reserve it.
    pub const PDO_COBID_MESSAGE_RESERVED_BIT: u64 = 1 << 0;
    /// Report the emergency message's `errorRegister` from the dictionary
    /// entry as it stood *before* this message's write, instead of from
    /// `data[2]` as the wire format defines. The dictionary write itself
    /// always happens regardless of this flag.
    pub const EMERGENCY_ERROR_REGISTER_FROM_DICTIONARY: u64 = 1 << 1;

    pub fn has(self, flag: u64) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u64) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u64) {
        self.0 &= !flag;
    }
}

/// Controlling state for a single remote node. Distinct instances (e.g.
/// one per node id) share no state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    node_id: u8,
    quirks: Quirks,
    dictionary: Dictionary,
    tpdo_mappings: Vec<PdoMapping>,
    rpdo_mappings: Vec<PdoMapping>,
    last_message_time: Timestamp,
    last_state_update: Timestamp,
    state: Option<NodeState>,
    use_unknown_sizes: bool,
}

impl StateMachine {
    pub fn new(node_id: u8) -> StateMachine {
        StateMachine {
            node_id,
            quirks: Quirks::default(),
            dictionary: Dictionary::new(),
            tpdo_mappings: vec![PdoMapping::new(); MAX_PDO],
            rpdo_mappings: vec![PdoMapping::new(); MAX_PDO],
            last_message_time: Timestamp::NULL,
            last_state_update: Timestamp::NULL,
            state: None,
            use_unknown_sizes: false,
        }
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    pub fn use_unknown_sizes(&self) -> bool {
        self.use_unknown_sizes
    }

    pub fn set_use_unknown_sizes(&mut self, value: bool) {
        self.use_unknown_sizes = value;
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn last_message_time(&self) -> Timestamp {
        self.last_message_time
    }

    pub fn last_state_update(&self) -> Timestamp {
        self.last_state_update
    }

    /// The last heartbeat-reported node state, if any has been received.
    pub fn node_state(&self) -> Option<NodeState> {
        self.state
    }

    // --- Dictionary forwarding -------------------------------------------------

    pub fn has(&self, object_id: u16, sub_id: u8) -> bool {
        self.dictionary.has(object_id, sub_id)
    }

    pub fn size_of(&self, object_id: u16, sub_id: u8) -> u8 {
        self.dictionary.size_of(object_id, sub_id)
    }

    pub fn timestamp(&self, object_id: u16, sub_id: u8) -> Timestamp {
        self.dictionary.timestamp(object_id, sub_id)
    }

    pub fn declare(&mut self, object_id: u16, sub_id: u8, size: u8) {
        self.dictionary.declare(object_id, sub_id, size);
    }

    pub fn get<T: LittleEndian>(&mut self, object_id: u16, sub_id: u8) -> Result<T, CanOpenError> {
        self.dictionary.get(object_id, sub_id)
    }

    pub fn set<T: LittleEndian>(
        &mut self,
        object_id: u16,
        sub_id: u8,
        value: T,
        time: Timestamp,
    ) -> Result<(), CanOpenError> {
        self.dictionary.set(object_id, sub_id, value, time)
    }

    // --- Classification ----------------------------------------------------

    /// Classifies and dispatches one inbound frame, updating the
    /// dictionary and returning an [`Update`] describing what happened.
    pub fn process(&mut self, frame: &Frame) -> Result<Update, CanOpenError> {
        let node_id = frame::get_node_id(frame);
        if !frame::is_broadcast(frame) && node_id != self.node_id {
            return Ok(Update::new(UpdateMode::NotForMe));
        }
        self.last_message_time = frame.time;

        match frame::get_function_code(frame) {
            frame::function::EMERGENCY => self.handle_emergency(frame),
            frame::function::NMT_HEARTBEAT => self.handle_heartbeat(frame),
            frame::function::SDO_TRANSMIT => self.handle_sdo(frame),
            frame::function::PDO0_TRANSMIT => self.handle_pdo_receive(0, frame),
            frame::function::PDO1_TRANSMIT => self.handle_pdo_receive(1, frame),
            frame::function::PDO2_TRANSMIT => self.handle_pdo_receive(2, frame),
            frame::function::PDO3_TRANSMIT => self.handle_pdo_receive(3, frame),
            _ => Ok(Update::new(UpdateMode::IgnoredMessage)),
        }
    }

    fn handle_emergency(&mut self, frame: &Frame) -> Result<Update, CanOpenError> {
        let em = emergency::parse_emergency(frame)?;
        if em.is_no_error() {
            return Ok(Update::new(UpdateMode::EmergencyNoError));
        }

        let previous_register = if self.quirks.has(Quirks::EMERGENCY_ERROR_REGISTER_FROM_DICTIONARY) {
            let mut buf = [0u8; 1];
            self.dictionary
                .get_raw(ERROR_REGISTER_OBJECT_ID, ERROR_REGISTER_SUB_ID, &mut buf)?;
            Some(buf[0])
        } else {
            None
        };

        self.dictionary.write_raw(
            ERROR_REGISTER_OBJECT_ID,
            ERROR_REGISTER_SUB_ID,
            &[em.error_register],
            1,
            true,
            frame.time,
        );

        let reported = Emergency {
            error_register: previous_register.unwrap_or(em.error_register),
            ..em
        };
        Err(CanOpenError::EmergencyMessageReceived(reported))
    }

    fn handle_heartbeat(&mut self, frame: &Frame) -> Result<Update, CanOpenError> {
        let (_, state) = nmt::parse_heartbeat(frame)?;
        self.state = Some(state);
        self.last_state_update = frame.time;
        Ok(Update::new(UpdateMode::Heartbeat))
    }

    fn handle_sdo(&mut self, frame: &Frame) -> Result<Update, CanOpenError> {
        let cmd = sdo::get_sdo_command(frame);
        match cmd.command {
            sdo::CMD_ABORT_DOMAIN_TRANSFER => Err(sdo::parse_domain_transfer_abort(frame)),
            sdo::CMD_INITIATE_DOMAIN_UPLOAD => {
                if !cmd.expedited {
                    log::warn!(
                        "node {}: ignored non-expedited SDO upload reply",
                        self.node_id
                    );
                    return Ok(Update::new(UpdateMode::IgnoredMessage));
                }
                if frame.time.is_null() {
                    return Err(CanOpenError::ProtocolError(
                        "received CAN message with zero timestamp".to_string(),
                    ));
                }
                let object_id = sdo::get_sdo_object_id(frame);
                let sub_id = sdo::get_sdo_object_sub_id(frame);

                let had_known_size = self.dictionary.known_size(object_id, sub_id);
                let declared_size = self.dictionary.size_of(object_id, sub_id);

                let (size, known_size) = if cmd.size != 0 {
                    (cmd.size as u8, true)
                } else if self.dictionary.has(object_id, sub_id) {
                    (declared_size, had_known_size)
                } else {
                    (4, false)
                };

                if had_known_size && declared_size != size {
                    return Err(CanOpenError::ProtocolError(
                        "unexpected object size in dictionary".to_string(),
                    ));
                }

                self.dictionary.write_raw(
                    object_id,
                    sub_id,
                    &frame.data[4..4 + size as usize],
                    size,
                    known_size,
                    frame.time,
                );
                Ok(Update::single(UpdateMode::Sdo, object_id, sub_id))
            }
            sdo::CMD_INITIATE_DOMAIN_DOWNLOAD_REPLY => Ok(Update::single(
                UpdateMode::SdoInitiateDownload,
                sdo::get_sdo_object_id(frame),
                sdo::get_sdo_object_sub_id(frame),
            )),
            0 | 1 => {
                log::debug!("node {}: ignored SDO command {}", self.node_id, cmd.command);
                Ok(Update::new(UpdateMode::SdoIgnoredCommand))
            }
            other => {
                log::debug!("node {}: unknown SDO command {}", self.node_id, other);
                Ok(Update::new(UpdateMode::SdoUnknownCommand))
            }
        }
    }

    fn handle_pdo_receive(&mut self, index: usize, frame: &Frame) -> Result<Update, CanOpenError> {
        if index >= MAX_PDO || self.tpdo_mappings[index].empty() {
            return Ok(Update::new(UpdateMode::PdoUnexpected));
        }
        let mapping = self.tpdo_mappings[index].clone();
        let mut updated = Vec::with_capacity(mapping.entries().len());
        let mut offset = 0usize;
        for entry in mapping.entries() {
            let size = entry.byte_size as usize;
            self.dictionary.write_raw(
                entry.object_id,
                entry.sub_id,
                &frame.data[offset..offset + size],
                entry.byte_size,
                true,
                frame.time,
            );
            updated.push((entry.object_id, entry.sub_id));
            offset += size;
        }
        Ok(Update {
            mode: UpdateMode::Pdo,
            updated,
        })
    }

    // --- Outbound operations -------------------------------------------------

    pub fn query_state(&self) -> Frame {
        nmt::make_nmt_node_guard(self.node_id)
    }

    pub fn query_state_transition(&self, transition: NodeStateTransition) -> Frame {
        nmt::make_module_control_command(transition, self.node_id)
    }

    pub fn sync(&self) -> Frame {
        Frame::new(frame::broadcast::SYNC, &[], Timestamp::NULL)
    }

    pub fn upload(&self, object_id: u16, sub_id: u8) -> Frame {
        sdo::make_initiate_domain_upload(self.node_id, object_id, sub_id)
    }

    /// Builds an initiate-download frame. Fails with
    /// [`CanOpenError::ObjectSizeMismatch`] if the dictionary already
    /// knows this object at a different size.
    pub fn download(&self, object_id: u16, sub_id: u8, data: &[u8]) -> Result<Frame, CanOpenError> {
        let declared = self.dictionary.size_of(object_id, sub_id);
        if declared != 0 && declared as usize != data.len() {
            return Err(CanOpenError::ObjectSizeMismatch {
                object_id,
                sub_id,
                declared,
                used: data.len() as u8,
            });
        }
        sdo::make_initiate_domain_download(self.node_id, object_id, sub_id, data, !self.use_unknown_sizes)
    }

    pub fn download_typed<T: LittleEndian>(
        &self,
        object_id: u16,
        sub_id: u8,
        value: T,
    ) -> Result<Frame, CanOpenError> {
        let mut buf = [0u8; 4];
        value.encode_le(&mut buf);
        self.download(object_id, sub_id, &buf[..T::SIZE])
    }

    /// Builds the current RPDO frame for `index` by concatenating the
    /// dictionary's stored bytes for each mapped object, in mapping order.
    pub fn get_rpdo_message(&self, index: usize) -> Result<Frame, CanOpenError> {
        if index >= MAX_PDO {
            return Err(CanOpenError::InvalidArgument(format!(
                "PDO index {index} is out of range (MAX_PDO = {MAX_PDO})"
            )));
        }
        let mapping = &self.rpdo_mappings[index];
        let mut data = [0u8; 8];
        let mut offset = 0usize;
        for entry in mapping.entries() {
            let size = entry.byte_size as usize;
            self.dictionary
                .get_raw(entry.object_id, entry.sub_id, &mut data[offset..offset + size])?;
            offset += size;
        }
        let can_id = pdo::default_cob_id(false, index as u8, self.node_id);
        Ok(Frame::new(can_id as u16, &data[..offset], Timestamp::NULL))
    }

    fn validate_pdo_mapping(&self, mapping: &PdoMapping) -> Result<(), CanOpenError> {
        for entry in mapping.entries() {
            let declared = self.dictionary.size_of(entry.object_id, entry.sub_id);
            if declared != 0 && declared != entry.byte_size {
                return Err(CanOpenError::ObjectSizeMismatch {
                    object_id: entry.object_id,
                    sub_id: entry.sub_id,
                    declared,
                    used: entry.byte_size,
                });
            }
        }
        Ok(())
    }

    pub fn declare_tpdo_mapping(&mut self, index: usize, mapping: PdoMapping) -> Result<(), CanOpenError> {
        self.validate_pdo_mapping(&mapping)?;
        for entry in mapping.entries() {
            self.dictionary.declare(entry.object_id, entry.sub_id, entry.byte_size);
        }
        if index >= self.tpdo_mappings.len() {
            self.tpdo_mappings.resize(index + 1, PdoMapping::new());
        }
        self.tpdo_mappings[index] = mapping;
        Ok(())
    }

    pub fn declare_rpdo_mapping(&mut self, index: usize, mapping: PdoMapping) -> Result<(), CanOpenError> {
        self.validate_pdo_mapping(&mapping)?;
        for entry in mapping.entries() {
            self.dictionary.declare(entry.object_id, entry.sub_id, entry.byte_size);
        }
        if index >= self.rpdo_mappings.len() {
            self.rpdo_mappings.resize(index + 1, PdoMapping::new());
        }
        self.rpdo_mappings[index] = mapping;
        Ok(())
    }

    pub fn configure_pdo(
        &self,
        transmit: bool,
        index: u8,
        params: &PdoCommunicationParameters,
        mapping: &PdoMapping,
    ) -> Result<Vec<Frame>, CanOpenError> {
        pdo::make_pdo_configuration_messages(
            transmit,
            self.node_id,
            index,
            params,
            mapping,
            self.quirks.has(Quirks::PDO_COBID_MESSAGE_RESERVED_BIT),
        )
    }

    pub fn configure_pdo_parameters(
        &self,
        transmit: bool,
        index: u8,
        params: &PdoCommunicationParameters,
    ) -> Result<Vec<Frame>, CanOpenError> {
        pdo::make_pdo_communication_parameters_messages(transmit, self.node_id, index, params)
    }

    pub fn configure_pdo_mapping(&self, transmit: bool, index: u8, mapping: &PdoMapping) -> Vec<Frame> {
        pdo::make_pdo_mapping_messages(transmit, self.node_id, index, mapping)
    }

    pub fn disable_pdo(&self, transmit: bool, index: u8, cob_id: u32) -> Frame {
        pdo::disable_pdo_message(
            transmit,
            self.node_id,
            index,
            cob_id,
            self.quirks.has(Quirks::PDO_COBID_MESSAGE_RESERVED_BIT),
        )
    }
}
