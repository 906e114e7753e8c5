//! Framing of the sensor command interface.
//!
//! ```text
//! 0x0A 0xFA | length (u16 LE) | packet type | payload (length bytes) | 0x0B
//! ```
//!
//! Vitals packets (type 2) carry ECG, IR and RED readings as little-endian `u16` values.

#![no_std]

#[macro_use]
extern crate logger;

use byteorder::{ByteOrder, LittleEndian};
use heapless::Vec;

pub const START_1: u8 = 0x0A;
pub const START_2: u8 = 0xFA;
pub const STOP: u8 = 0x0B;

pub const PACKET_TYPE_VITALS: u8 = 2;
pub const VITALS_PAYLOAD_LEN: usize = 6;

/// Start bytes, length and packet type.
pub const HEADER_LEN: usize = 5;
/// Header and stop byte.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + 1;
pub const VITALS_FRAME_LEN: usize = FRAME_OVERHEAD + VITALS_PAYLOAD_LEN;

// Byte positions within a frame.
const POS_LENGTH_LSB: u32 = 2;
const POS_LENGTH_MSB: u32 = 3;
const POS_PACKET_TYPE: u32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleTriplet {
    pub ecg: u16,
    pub ir: u16,
    pub red: u16,
}

impl SampleTriplet {
    pub fn from_payload(payload: &[u8; VITALS_PAYLOAD_LEN]) -> Self {
        Self {
            ecg: LittleEndian::read_u16(&payload[0..2]),
            ir: LittleEndian::read_u16(&payload[2..4]),
            red: LittleEndian::read_u16(&payload[4..6]),
        }
    }

    pub fn to_payload(&self) -> [u8; VITALS_PAYLOAD_LEN] {
        let mut payload = [0; VITALS_PAYLOAD_LEN];
        LittleEndian::write_u16_into(&[self.ecg, self.ir, self.red], &mut payload);
        payload
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    #[default]
    Init,
    Sof1Found,
    Sof2Found,
    HeaderOrBody,
}

/// Progress through the frame currently being received.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameState {
    pub state: State,
    /// Position of the last received byte within the frame.
    pub position: u32,
    pub length: u16,
    pub packet_type: u8,
    /// Payload of vitals packets. Bytes past the sixth are counted but not stored.
    pub payload: Vec<u8, VITALS_PAYLOAD_LEN>,
}

impl FrameState {
    fn stop_position(&self) -> u32 {
        HEADER_LEN as u32 + u32::from(self.length)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderStats {
    pub frames_decoded: u32,
    /// Frames abandoned because of a broken start sequence, a bad stop byte or a reset.
    pub frames_dropped: u32,
    /// Well formed frames that did not carry a vitals sample.
    pub packets_ignored: u32,
}

/// Reassembles sample triplets from the byte stream, one byte at a time.
///
/// Any framing error returns the decoder to its initial state, so it resynchronizes on the next
/// start sequence.
#[derive(Default)]
pub struct PacketDecoder {
    frame: FrameState,
    stats: DecoderStats,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    #[inline]
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Abandons the frame in progress, e.g. because the byte source changed.
    pub fn reset(&mut self) {
        if self.frame.state != State::Init {
            debug!("Dropping partial frame at position {}", self.frame.position);
            self.stats.frames_dropped += 1;
        }
        self.frame = FrameState::default();
    }

    pub fn feed(&mut self, byte: u8) -> Option<SampleTriplet> {
        match self.frame.state {
            State::Init => {
                if byte == START_1 {
                    self.frame.state = State::Sof1Found;
                }
                None
            }
            State::Sof1Found => {
                if byte == START_2 {
                    self.frame.state = State::Sof2Found;
                } else {
                    trace!("Broken start sequence");
                    self.stats.frames_dropped += 1;
                    self.frame = FrameState::default();
                }
                None
            }
            State::Sof2Found => {
                self.frame.length = u16::from(byte);
                self.frame.position = POS_LENGTH_LSB;
                self.frame.payload.clear();
                self.frame.state = State::HeaderOrBody;
                None
            }
            State::HeaderOrBody => self.header_or_body(byte),
        }
    }

    fn header_or_body(&mut self, byte: u8) -> Option<SampleTriplet> {
        self.frame.position += 1;

        match self.frame.position {
            POS_LENGTH_MSB => self.frame.length |= u16::from(byte) << 8,
            POS_PACKET_TYPE => self.frame.packet_type = byte,
            p if p < self.frame.stop_position() => {
                if self.frame.packet_type == PACKET_TYPE_VITALS {
                    // A full buffer means the payload is longer than a vitals sample; the extra
                    // bytes only advance the position.
                    _ = self.frame.payload.push(byte);
                }
            }
            _ => return self.finish_frame(byte),
        }

        None
    }

    fn finish_frame(&mut self, stop: u8) -> Option<SampleTriplet> {
        let frame = core::mem::take(&mut self.frame);

        if stop != STOP {
            debug!("Invalid stop byte {}, dropping frame", stop);
            self.stats.frames_dropped += 1;
            return None;
        }

        if frame.packet_type != PACKET_TYPE_VITALS {
            trace!("Ignoring packet type {}", frame.packet_type);
            self.stats.packets_ignored += 1;
            return None;
        }

        match <[u8; VITALS_PAYLOAD_LEN]>::try_from(frame.payload.as_slice()) {
            Ok(payload) => {
                self.stats.frames_decoded += 1;
                Some(SampleTriplet::from_payload(&payload))
            }
            Err(_) => {
                debug!("Vitals packet with {} byte payload", frame.payload.len());
                self.stats.packets_ignored += 1;
                None
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    PayloadTooLong,
    BufferTooSmall,
}

/// Builds a frame carrying `payload`.
pub fn encode_frame<const N: usize>(
    packet_type: u8,
    payload: &[u8],
) -> Result<Vec<u8, N>, EncodeError> {
    let length = u16::try_from(payload.len()).map_err(|_| EncodeError::PayloadTooLong)?;

    let mut length_bytes = [0; 2];
    LittleEndian::write_u16(&mut length_bytes, length);

    let header = [START_1, START_2, length_bytes[0], length_bytes[1], packet_type];

    let mut frame = Vec::new();
    frame
        .extend_from_slice(&header)
        .map_err(|_| EncodeError::BufferTooSmall)?;
    frame
        .extend_from_slice(payload)
        .map_err(|_| EncodeError::BufferTooSmall)?;
    frame.push(STOP).map_err(|_| EncodeError::BufferTooSmall)?;

    Ok(frame)
}

/// Builds a vitals frame.
pub fn encode_vitals(sample: SampleTriplet) -> [u8; VITALS_FRAME_LEN] {
    let mut frame = [0; VITALS_FRAME_LEN];

    frame[0] = START_1;
    frame[1] = START_2;
    LittleEndian::write_u16(&mut frame[2..4], VITALS_PAYLOAD_LEN as u16);
    frame[4] = PACKET_TYPE_VITALS;
    frame[HEADER_LEN..HEADER_LEN + VITALS_PAYLOAD_LEN].copy_from_slice(&sample.to_payload());
    frame[VITALS_FRAME_LEN - 1] = STOP;

    frame
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec::Vec as StdVec;

    use super::*;

    fn decode_all(decoder: &mut PacketDecoder, bytes: &[u8]) -> StdVec<SampleTriplet> {
        bytes.iter().filter_map(|byte| decoder.feed(*byte)).collect()
    }

    #[test]
    fn decodes_reference_frame() {
        #[rustfmt::skip]
        let bytes = [
            0x0A, 0xFA, 0x06, 0x00, 0x02,
            0x64, 0x00, 0xD0, 0x07, 0xB8, 0x0B,
            0x0B,
        ];

        let mut decoder = PacketDecoder::new();
        let samples = decode_all(&mut decoder, &bytes);

        assert_eq!(
            samples,
            [SampleTriplet {
                ecg: 100,
                ir: 2000,
                red: 3000
            }]
        );
        assert_eq!(decoder.frame(), &FrameState::default());
        assert_eq!(decoder.stats().frames_decoded, 1);
    }

    #[test]
    fn encoded_vitals_decode_exactly_once() {
        #[rustfmt::skip]
        let table = [
            SampleTriplet { ecg: 0, ir: 0, red: 0 },
            SampleTriplet { ecg: 0x0A0B, ir: 0xFA0A, red: 0x0B0B },
            SampleTriplet { ecg: u16::MAX, ir: 1, red: 0x8000 },
        ];

        for sample in table {
            let mut decoder = PacketDecoder::new();
            let frame = encode_vitals(sample);

            assert_eq!(decode_all(&mut decoder, &frame), [sample]);
        }
    }

    #[test]
    fn generic_encoder_matches_vitals_encoder() {
        let sample = SampleTriplet {
            ecg: 1,
            ir: 2,
            red: 3,
        };

        let frame = encode_frame::<16>(PACKET_TYPE_VITALS, &sample.to_payload()).unwrap();

        assert_eq!(frame.as_slice(), encode_vitals(sample).as_slice());
    }

    #[test]
    fn encoder_reports_small_buffer() {
        assert_eq!(
            encode_frame::<8>(PACKET_TYPE_VITALS, &[0; 6]),
            Err(EncodeError::BufferTooSmall)
        );
    }

    #[test]
    fn malformed_frames_restore_initial_state() {
        let valid = encode_vitals(SampleTriplet::default());

        let mut bad_stop = valid;
        bad_stop[VITALS_FRAME_LEN - 1] = 0x0C;

        #[rustfmt::skip]
        let table: [&[u8]; 4] = [
            &bad_stop,
            &[0x0A, 0x00],
            &[0x0A, 0x0A],
            &[0x0A, 0xFA, 0x00, 0x00, 0x01, 0xFF],
        ];

        for bytes in table {
            let mut decoder = PacketDecoder::new();

            assert!(decode_all(&mut decoder, bytes).is_empty());
            assert_eq!(decoder.frame(), &FrameState::default(), "bytes: {bytes:x?}");
            assert_eq!(decoder.stats().frames_dropped, 1);
        }
    }

    #[test]
    fn resynchronizes_after_garbage() {
        let sample = SampleTriplet {
            ecg: 7,
            ir: 8,
            red: 9,
        };

        let mut bytes = StdVec::new();
        bytes.extend_from_slice(&[0xFF, 0x0A, 0x13, 0x37]);
        // The truncated frame swallows the header of the next one and then sees a bad stop byte.
        bytes.extend_from_slice(&encode_vitals(sample)[..7]);
        bytes.extend_from_slice(&encode_vitals(sample));
        bytes.extend_from_slice(&encode_vitals(sample));

        let mut decoder = PacketDecoder::new();

        assert_eq!(decode_all(&mut decoder, &bytes), [sample]);
        assert_eq!(decoder.stats().frames_dropped, 2);
    }

    #[test]
    fn other_packet_types_are_consumed_silently() {
        let other = encode_frame::<32>(5, &[START_1, START_2, STOP, 0, 1, 2, 3, 4]).unwrap();
        let sample = SampleTriplet {
            ecg: 10,
            ir: 20,
            red: 30,
        };

        let mut bytes = StdVec::new();
        bytes.extend_from_slice(&other);
        bytes.extend_from_slice(&encode_vitals(sample));

        let mut decoder = PacketDecoder::new();

        assert_eq!(decode_all(&mut decoder, &bytes), [sample]);
        assert_eq!(decoder.stats().packets_ignored, 1);
    }

    #[test]
    fn payload_length_must_cover_a_sample() {
        #[rustfmt::skip]
        let table: [(&[u8], usize); 3] = [
            // payload, decoded samples
            (&[1, 0, 2, 0], 0),
            (&[1, 0, 2, 0, 3, 0], 1),
            // Only the first six bytes are kept.
            (&[1, 0, 2, 0, 3, 0, 4, 0], 1),
        ];

        for (payload, expected) in table {
            let frame = encode_frame::<32>(PACKET_TYPE_VITALS, payload).unwrap();
            let mut decoder = PacketDecoder::new();

            let samples = decode_all(&mut decoder, &frame);

            assert_eq!(samples.len(), expected, "payload: {payload:?}");
            if let Some(sample) = samples.first() {
                assert_eq!(
                    *sample,
                    SampleTriplet {
                        ecg: 1,
                        ir: 2,
                        red: 3
                    }
                );
            }
            assert_eq!(decoder.frame(), &FrameState::default());
        }
    }

    #[test]
    fn reset_drops_partial_frame() {
        let frame = encode_vitals(SampleTriplet::default());
        let mut decoder = PacketDecoder::new();

        decode_all(&mut decoder, &frame[..8]);
        decoder.reset();

        assert_eq!(decoder.frame(), &FrameState::default());
        assert_eq!(decoder.stats().frames_dropped, 1);
        assert_eq!(decode_all(&mut decoder, &frame).len(), 1);
    }
}
