//! Conversion between [`Frame`] and [`socketcan::CanFrame`].
//!
//! This is the only place the crate mentions an actual transport. It does
//! no I/O itself — opening the socket and pumping frames through
//! [`crate::state_machine::StateMachine::process`] is the driver loop's
//! job, not this crate's.

use socketcan::{CanFrame, EmbeddedFrame, Frame as SocketCanFrameExt, Id, StandardId};

use crate::error::CanOpenError;
use crate::frame::{Frame, Timestamp};

fn id_as_raw_std(frame: &CanFrame) -> Result<u16, CanOpenError> {
    match frame.id() {
        Id::Standard(id) => Ok(id.as_raw()),
        Id::Extended(_) => Err(CanOpenError::ParseError(
            "got an extended (29-bit) CAN id, this engine only speaks standard (11-bit) ids".to_string(),
        )),
    }
}

fn u16_as_id(can_id: u16) -> Result<StandardId, CanOpenError> {
    StandardId::new(can_id).ok_or_else(|| {
        CanOpenError::InvalidArgument(format!("{can_id:#06x} does not fit an 11-bit CAN id"))
    })
}

/// Converts a socket frame into the shape the state machine consumes.
/// `time` is supplied by the caller — this crate never reads a clock, and
/// `socketcan` frames don't carry one themselves.
pub fn from_socketcan(frame: &CanFrame, time: Timestamp) -> Result<Frame, CanOpenError> {
    let can_id = id_as_raw_std(frame)?;
    Ok(Frame::new(can_id, frame.data(), time))
}

/// Converts an outbound [`Frame`] into a `socketcan::CanFrame` ready to
/// write to a socket.
pub fn to_socketcan(frame: &Frame) -> Result<CanFrame, CanOpenError> {
    let id = u16_as_id(frame.can_id)?;
    CanFrame::new(id, frame.payload())
        .ok_or_else(|| CanOpenError::InvalidArgument("payload too long for a classic CAN frame".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_standard_frame() {
        let frame = Frame::new(0x582, &[1, 2, 3, 4, 5, 6, 7, 8], Timestamp::NULL);
        let can_frame = to_socketcan(&frame).unwrap();
        let back = from_socketcan(&can_frame, Timestamp::from_ticks(1)).unwrap();
        assert_eq!(back.can_id, frame.can_id);
        assert_eq!(back.payload(), frame.payload());
    }

    #[test]
    fn rejects_ids_too_wide_for_11_bits() {
        let frame = Frame::new(0x1FFF, &[], Timestamp::NULL);
        assert!(to_socketcan(&frame).is_err());
    }
}
