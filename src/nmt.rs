//! NMT codec: module control commands, node guard requests, and heartbeat
//! parsing.

use crate::error::CanOpenError;
use crate::frame::{self, Frame, Timestamp};

/// A node's reported NMT state, as carried in byte 0 of a heartbeat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initializing,
    Stopped,
    Operational,
    PreOperational,
}

impl NodeState {
    pub fn from_byte(byte: u8) -> Option<NodeState> {
        match byte {
            0x00 => Some(NodeState::Initializing),
            0x04 => Some(NodeState::Stopped),
            0x05 => Some(NodeState::Operational),
            0x7F => Some(NodeState::PreOperational),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            NodeState::Initializing => 0x00,
            NodeState::Stopped => 0x04,
            NodeState::Operational => 0x05,
            NodeState::PreOperational => 0x7F,
        }
    }
}

/// A requested NMT state transition, as sent in a module control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStateTransition {
    Start,
    Stop,
    EnterPreOperational,
    Reset,
    ResetCommunication,
}

impl NodeStateTransition {
    pub fn as_byte(self) -> u8 {
        match self {
            NodeStateTransition::Start => 0x01,
            NodeStateTransition::Stop => 0x02,
            NodeStateTransition::EnterPreOperational => 0x80,
            NodeStateTransition::Reset => 0x81,
            NodeStateTransition::ResetCommunication => 0x82,
        }
    }
}

/// Builds the NMT module control command frame that drives `nodeId` through
/// `transition`.
pub fn make_module_control_command(transition: NodeStateTransition, node_id: u8) -> Frame {
    Frame::new(
        frame::broadcast::NMT_MODULE_CONTROL,
        &[transition.as_byte(), node_id],
        Timestamp::NULL,
    )
}

/// Builds a node guard request (a zero-length remote frame in real CAN
/// hardware; modeled here simply as a zero-length data frame, since RTR
/// framing is a transport concern).
pub fn make_nmt_node_guard(node_id: u8) -> Frame {
    Frame::new(frame::function::NMT_HEARTBEAT + node_id as u16, &[], Timestamp::NULL)
}

/// Parses a heartbeat frame, returning `(nodeId, state)`. Fails with
/// [`CanOpenError::BadMessage`] if the frame's function code isn't
/// `NMT_HEARTBEAT`, or [`CanOpenError::ParseError`] if byte 0 isn't a
/// recognized node state.
pub fn parse_heartbeat(frame: &Frame) -> Result<(u8, NodeState), CanOpenError> {
    if frame::get_function_code(frame) != frame::function::NMT_HEARTBEAT {
        return Err(CanOpenError::BadMessage(format!(
            "frame with can_id {:#06x} is not a heartbeat",
            frame.can_id
        )));
    }
    let payload = frame.payload();
    let byte = payload.first().copied().unwrap_or(0);
    let state = NodeState::from_byte(byte)
        .ok_or_else(|| CanOpenError::ParseError(format!("unrecognized node state byte {byte:#04x}")))?;
    Ok((frame::get_node_id(frame), state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_control_command_shape() {
        let f = make_module_control_command(NodeStateTransition::ResetCommunication, 5);
        assert_eq!(f.can_id, 0x000);
        assert_eq!(f.payload(), &[0x82, 0x05]);
    }

    #[test]
    fn node_guard_shape() {
        let f = make_nmt_node_guard(3);
        assert_eq!(f.can_id, 0x703);
        assert_eq!(f.size, 0);
    }

    #[test]
    fn parse_heartbeat_stopped() {
        let f = Frame::new(0x702, &[0x04], Timestamp::from_ticks(1));
        let (node_id, state) = parse_heartbeat(&f).unwrap();
        assert_eq!(node_id, 2);
        assert_eq!(state, NodeState::Stopped);
    }

    #[test]
    fn parse_heartbeat_bootup_is_initializing() {
        let f = Frame::new(0x702, &[0x00], Timestamp::from_ticks(1));
        let (_, state) = parse_heartbeat(&f).unwrap();
        assert_eq!(state, NodeState::Initializing);
    }

    #[test]
    fn parse_heartbeat_rejects_wrong_function_code() {
        let f = Frame::new(0x582, &[0x04], Timestamp::from_ticks(1));
        assert!(matches!(parse_heartbeat(&f), Err(CanOpenError::BadMessage(_))));
    }
}
