use crate::codec::{ChannelCodec, CodecError};
use crate::types::{ControlValue, DeviceIdentifier, WriteOutcome};

#[test]
fn encode_matches_driver_format() {
    let codec = ChannelCodec::rgb();
    assert_eq!(codec.encode(&ControlValue::rgb(255, 0, 128)), b"255,0,128");
    assert_eq!(
        codec.with_trailing_newline(true).encode(&ControlValue::rgb(1, 2, 3)),
        b"1,2,3\n"
    );
}

#[test]
fn decode_round_trip() {
    let codec = ChannelCodec::rgb();
    let v = ControlValue::rgb(255, 0, 128);
    assert_eq!(codec.decode(&codec.encode(&v)).expect("decode"), v);
}

#[test]
fn decode_tolerates_one_trailing_newline() {
    let codec = ChannelCodec::rgb();
    assert_eq!(
        codec.decode(b"10,20,30\n").expect("decode"),
        ControlValue::rgb(10, 20, 30)
    );
    // Sloppy spacing is fine, the driver's parser skips it too.
    assert_eq!(
        codec.decode(b"10, 20, 30").expect("decode"),
        ControlValue::rgb(10, 20, 30)
    );
}

#[test]
fn decode_rejects_bad_input() {
    let codec = ChannelCodec::rgb();
    for raw in [
        &b"255,0"[..],
        b"255,0,128,7",
        b"256,0,0",
        b"-1,0,0",
        b"a,b,c",
        b"",
        b"\n",
        b"255,,0",
        b"\xff\xfe\x00",
    ] {
        assert!(
            matches!(codec.decode(raw), Err(CodecError::Malformed(_))),
            "accepted {:?}",
            raw
        );
    }
}

#[test]
fn identifier_parse_and_display() {
    let id: DeviceIdentifier = "320F:5055".parse().expect("parse");
    assert_eq!(id, DeviceIdentifier::new(0x320f, 0x5055));
    assert_eq!(id.to_string(), "320f:5055");

    let id: DeviceIdentifier = "320f:5055.3".parse().expect("parse");
    assert_eq!(id.interface, Some(3));
    assert_eq!(id.to_string(), "320f:5055.3");

    for bad in ["320f", "zzzz:5055", "320f:5055.", "320f:5055.xx", ""] {
        assert!(bad.parse::<DeviceIdentifier>().is_err(), "accepted {:?}", bad);
    }
}

#[test]
fn outcome_applied_flag() {
    assert!(WriteOutcome::Success.applied());
    assert!(WriteOutcome::VerificationUnsupported.applied());
    assert!(!WriteOutcome::ToolMissing {
        helper: "sudo".into()
    }
    .applied());
    assert!(!WriteOutcome::PermissionDenied {
        detail: "Sorry, try again.".into()
    }
    .applied());
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn round_trip_rgb(r: u8, g: u8, b: u8) {
            let codec = ChannelCodec::rgb();
            let v = ControlValue::rgb(r, g, b);
            prop_assert_eq!(codec.decode(&codec.encode(&v)).unwrap(), v);
        }

        #[test]
        fn round_trip_any_arity(channels in proptest::collection::vec(any::<u8>(), 1..8)) {
            let codec = ChannelCodec::new(channels.len(), false);
            let v = ControlValue::new(channels);
            prop_assert_eq!(codec.decode(&codec.encode(&v)).unwrap(), v);
        }

        #[test]
        fn decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = ChannelCodec::rgb().decode(&raw);
        }

        #[test]
        fn decode_never_partial(raw in "[0-9,]{0,12}") {
            // Whatever comes back has exactly the contracted arity.
            if let Ok(v) = ChannelCodec::rgb().decode(raw.as_bytes()) {
                prop_assert_eq!(v.channels.len(), 3);
            }
        }
    }
}
