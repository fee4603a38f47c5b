//! Emergency codec: parses the fixed 8-byte emergency frame.

use crate::error::CanOpenError;
use crate::frame::{self, Frame, LittleEndian};

/// A parsed emergency message. `error_register` is populated by
/// [`parse_emergency`] straight from `data[2]`, per the CANopen wire
/// format; the state machine is responsible for the documented
/// `EMERGENCY_ERROR_REGISTER_FROM_DICTIONARY` quirk that instead reports
/// whatever the dictionary held before this message was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emergency {
    pub error_code: u16,
    pub error_register: u8,
    pub vendor_data: [u8; 5],
}

impl std::fmt::Display for Emergency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "code={:#06x} register={:#04x}",
            self.error_code, self.error_register
        )
    }
}

impl Emergency {
    /// The "no error" family occupies the top byte of the error code.
    pub fn is_no_error(&self) -> bool {
        (self.error_code >> 8) == 0
    }
}

/// Parses an emergency frame. Fails with [`CanOpenError::BadMessage`] if
/// the function code isn't `EMERGENCY`.
pub fn parse_emergency(frame: &Frame) -> Result<Emergency, CanOpenError> {
    if frame::get_function_code(frame) != frame::function::EMERGENCY {
        return Err(CanOpenError::BadMessage(format!(
            "frame with can_id {:#06x} is not an emergency message",
            frame.can_id
        )));
    }
    let data = &frame.data;
    let mut vendor_data = [0u8; 5];
    vendor_data.copy_from_slice(&data[3..8]);
    Ok(Emergency {
        error_code: u16::decode_le(&data[0..2]),
        error_register: data[2],
        vendor_data,
    })
}
