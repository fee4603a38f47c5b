//! Exercises the SDO codec (`canopen_master::sdo`) and the facade's typed
//! accessors together, the way an application pairing `facade::Node` with
//! a real transport would use them.

use canopen_master::facade::{ErrorRegister, IdentityObject, Node, ProducerHeartbeatTime};
use canopen_master::frame::{Frame, LittleEndian, Timestamp};
use canopen_master::sdo;
use canopen_master::CanOpenError;

#[test]
fn upload_then_process_reply_through_facade() {
    let mut node = Node::new(7);
    let request = node.query_upload::<ProducerHeartbeatTime>(0, 0);
    assert_eq!(sdo::get_sdo_object_id(&request), 0x1017);
    assert_eq!(sdo::get_sdo_object_sub_id(&request), 0);

    let mut data = [0u8; 8];
    data[0] = 0x43; // initiate upload reply, expedited, size indicated, n=0 -> size 4
    sdo::get_sdo_object_id(&request).encode_le(&mut data[1..3]);
    data[3] = 0;
    1000u32.encode_le(&mut data[4..8]);
    let reply = Frame::new(0x587, &data, Timestamp::from_ticks(1));

    node.process(&reply).unwrap();
    assert_eq!(node.get::<ProducerHeartbeatTime>(0, 0).unwrap(), 1000);
}

#[test]
fn download_value_round_trips_object_id() {
    let node = Node::new(7);
    let frame = node.query_download_value::<IdentityObject>(0xDEAD_BEEF, 0, 0).unwrap();
    assert_eq!(sdo::get_sdo_object_id(&frame), 0x1018);
    assert_eq!(sdo::get_sdo_object_sub_id(&frame), 4);
    assert_eq!(u32::decode_le(&frame.data[4..8]), 0xDEAD_BEEF);
}

#[test]
fn facade_rejects_reading_an_object_never_observed() {
    let node = Node::new(7);
    assert!(!node.has::<ErrorRegister>(0, 0));
    assert!(node.timestamp::<ErrorRegister>(0, 0).is_null());
}

#[test]
fn sdo_command_byte_round_trips_through_make_and_get() {
    let frame = sdo::make_initiate_domain_upload(7, 0x6040, 0);
    let cmd = sdo::get_sdo_command(&frame);
    assert_eq!(cmd.command, sdo::CMD_INITIATE_DOMAIN_UPLOAD);
    assert_eq!(sdo::get_sdo_object_id(&frame), 0x6040);
    assert_eq!(sdo::get_sdo_object_sub_id(&frame), 0);
}

#[test]
fn segmented_sizes_are_rejected_by_the_download_builder() {
    let err = sdo::make_initiate_domain_download(7, 0x1018, 1, &[1, 2, 3, 4, 5, 6], true).unwrap_err();
    assert_eq!(err, CanOpenError::Unsupported(6));
}
