//! High-level typed façade over [`StateMachine`], keyed by compile-time
//! object descriptors instead of raw `(objectId, subId)` pairs.

use crate::frame::{Frame, LittleEndian, Timestamp};
use crate::error::CanOpenError;
use crate::nmt::NodeStateTransition;
use crate::state_machine::{StateMachine, Update};

/// A compile-time-known object: its dictionary key and wire type. Wraps a
/// single zero-sized marker type per object, built with [`define_object!`].
pub trait ObjectDescriptor {
    const OBJECT_ID: u16;
    const OBJECT_SUB_ID: u8;
    type ObjectType: LittleEndian;
}

/// Declares a zero-sized marker type implementing [`ObjectDescriptor`].
macro_rules! define_object {
    ($(#[$meta:meta])* $name:ident, $id:expr, $sub:expr, $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl ObjectDescriptor for $name {
            const OBJECT_ID: u16 = $id;
            const OBJECT_SUB_ID: u8 = $sub;
            type ObjectType = $ty;
        }
    };
}

define_object!(
    /// `0x1000:0` — device type, vendor-specific bitfield.
    DeviceType, 0x1000, 0, u32
);
define_object!(
    /// `0x1001:0` — the error register the emergency handler writes to.
    ErrorRegister, 0x1001, 0, u8
);
define_object!(
    /// `0x1002:0` — manufacturer-specific status register.
    ManufacturerStatusRegister, 0x1002, 0, u32
);
define_object!(
    /// `0x1016:2` — consumer heartbeat time for the second monitored node.
    ConsumerHeartbeatTime, 0x1016, 2, u32
);
define_object!(
    /// `0x1017:0` — producer heartbeat time, in milliseconds.
    ProducerHeartbeatTime, 0x1017, 0, u32
);
define_object!(
    /// `0x1018:4` — fourth identity sub-object (serial number).
    IdentityObject, 0x1018, 4, u32
);

fn offset_id(base: u16, offset: i32) -> u16 {
    (base as i32 + offset) as u16
}

fn offset_sub(base: u8, offset: i32) -> u8 {
    (base as i32 + offset) as u8
}

/// Owns a single [`StateMachine`] and forwards to it through typed object
/// descriptors, adding no state of its own.
#[derive(Debug, Clone)]
pub struct Node {
    state_machine: StateMachine,
}

impl Node {
    pub fn new(node_id: u8) -> Node {
        Node {
            state_machine: StateMachine::new(node_id),
        }
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.state_machine
    }

    pub fn state_machine_mut(&mut self) -> &mut StateMachine {
        &mut self.state_machine
    }

    pub fn process(&mut self, frame: &Frame) -> Result<Update, CanOpenError> {
        self.state_machine.process(frame)
    }

    pub fn query_state(&self) -> Frame {
        self.state_machine.query_state()
    }

    pub fn query_state_transition(&self, transition: NodeStateTransition) -> Frame {
        self.state_machine.query_state_transition(transition)
    }

    pub fn query_upload<D: ObjectDescriptor>(&self, id_offset: i32, sub_offset: i32) -> Frame {
        self.state_machine.upload(
            offset_id(D::OBJECT_ID, id_offset),
            offset_sub(D::OBJECT_SUB_ID, sub_offset),
        )
    }

    /// Builds a download frame from the value currently stored in the
    /// dictionary for `D`.
    pub fn query_download<D: ObjectDescriptor>(&mut self) -> Result<Frame, CanOpenError> {
        let value = self.get::<D>(0, 0)?;
        self.state_machine
            .download_typed(D::OBJECT_ID, D::OBJECT_SUB_ID, value)
    }

    pub fn query_download_value<D: ObjectDescriptor>(
        &self,
        value: D::ObjectType,
        id_offset: i32,
        sub_offset: i32,
    ) -> Result<Frame, CanOpenError> {
        self.state_machine.download_typed(
            offset_id(D::OBJECT_ID, id_offset),
            offset_sub(D::OBJECT_SUB_ID, sub_offset),
            value,
        )
    }

    pub fn get<D: ObjectDescriptor>(&mut self, id_offset: i32, sub_offset: i32) -> Result<D::ObjectType, CanOpenError> {
        self.state_machine
            .get(offset_id(D::OBJECT_ID, id_offset), offset_sub(D::OBJECT_SUB_ID, sub_offset))
    }

    pub fn has<D: ObjectDescriptor>(&self, id_offset: i32, sub_offset: i32) -> bool {
        self.state_machine
            .has(offset_id(D::OBJECT_ID, id_offset), offset_sub(D::OBJECT_SUB_ID, sub_offset))
    }

    pub fn timestamp<D: ObjectDescriptor>(&self, id_offset: i32, sub_offset: i32) -> Timestamp {
        self.state_machine
            .timestamp(offset_id(D::OBJECT_ID, id_offset), offset_sub(D::OBJECT_SUB_ID, sub_offset))
    }

    pub fn set<D: ObjectDescriptor>(&mut self, value: D::ObjectType, time: Timestamp) -> Result<(), CanOpenError> {
        self.state_machine.set(D::OBJECT_ID, D::OBJECT_SUB_ID, value, time)
    }

    pub fn set_offset<D: ObjectDescriptor>(
        &mut self,
        value: D::ObjectType,
        id_offset: i32,
        sub_offset: i32,
        time: Timestamp,
    ) -> Result<(), CanOpenError> {
        self.state_machine.set(
            offset_id(D::OBJECT_ID, id_offset),
            offset_sub(D::OBJECT_SUB_ID, sub_offset),
            value,
            time,
        )
    }

    pub fn get_rpdo_message(&self, index: usize) -> Result<Frame, CanOpenError> {
        self.state_machine.get_rpdo_message(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip_through_descriptor() {
        let mut node = Node::new(2);
        node.set::<ProducerHeartbeatTime>(1000, Timestamp::from_ticks(1)).unwrap();
        assert_eq!(node.get::<ProducerHeartbeatTime>(0, 0).unwrap(), 1000);
        assert!(node.has::<ProducerHeartbeatTime>(0, 0));
    }

    #[test]
    fn query_upload_uses_offsets() {
        let node = Node::new(2);
        let frame = node.query_upload::<IdentityObject>(0, -1);
        assert_eq!(crate::sdo::get_sdo_object_id(&frame), 0x1018);
        assert_eq!(crate::sdo::get_sdo_object_sub_id(&frame), 3);
    }

    #[test]
    fn query_download_builds_from_stored_value() {
        let mut node = Node::new(2);
        node.set::<ErrorRegister>(0x05, Timestamp::from_ticks(1)).unwrap();
        let frame = node.query_download::<ErrorRegister>().unwrap();
        assert_eq!(crate::sdo::get_sdo_object_id(&frame), 0x1001);
        assert_eq!(frame.data[4], 0x05);
    }
}
