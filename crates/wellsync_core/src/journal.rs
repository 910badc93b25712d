//! Journal frames.
//!
//! Every store call becomes one frame:
//!
//! ```text
//! magic "WSJ1" (4) | version u16 (2) | kind u8 (1) | len u32 (4) | payload (len) | crc32 (4)
//! ```
//!
//! The payload is the CBOR encoding of the frame's mutation list. The CRC
//! covers everything before it. A frame is all-or-nothing: replay stops at
//! the first incomplete or checksum-failing frame, which can only be the
//! tail left by an interrupted append.

use crate::entity::Collection;
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"WSJ1";

/// Current frame format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + kind (1) + length (4)
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;

/// What a frame means when replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Mutations applied on top of the current state.
    Commit = 1,
    /// Complete state; replaces everything replayed so far.
    Snapshot = 2,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// A single change to one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert or replace a row.
    Put {
        /// Target collection.
        collection: Collection,
        /// Row key.
        id: String,
        /// Encoded row.
        value: ciborium::Value,
    },
    /// Remove a row.
    Delete {
        /// Target collection.
        collection: Collection,
        /// Row key.
        id: String,
    },
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Mutations in application order.
    pub mutations: Vec<Mutation>,
}

/// Result of scanning a journal.
#[derive(Debug)]
pub struct Replay {
    /// Complete frames, in order.
    pub frames: Vec<Frame>,
    /// Length of the valid prefix; anything beyond is a torn tail.
    pub valid_len: u64,
}

impl Replay {
    /// Whether bytes past the last complete frame were found.
    pub fn has_torn_tail(&self, total_len: u64) -> bool {
        self.valid_len < total_len
    }
}

/// Encodes a frame into its on-disk bytes.
pub fn encode_frame(kind: FrameKind, mutations: &[Mutation]) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(&mutations, &mut payload).map_err(StoreError::codec)?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Codec("journal frame payload too large".into()))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&JOURNAL_MAGIC);
    data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    data.push(kind as u8);
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Scans `bytes` frame by frame.
///
/// # Errors
///
/// Returns [`StoreError::Corrupted`] when a frame passes its checksum but
/// carries an unknown version or kind, or an undecodable payload. Torn
/// tails are not errors; they are reported through [`Replay::valid_len`].
pub fn replay(bytes: &[u8]) -> StoreResult<Replay> {
    let mut frames = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let Some(header) = bytes.get(pos..pos + HEADER_SIZE) else {
            break;
        };
        if header[0..4] != JOURNAL_MAGIC {
            break;
        }

        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let end = pos + HEADER_SIZE + len + CRC_SIZE;
        let Some(frame_bytes) = bytes.get(pos..end) else {
            break;
        };

        let (body, crc_bytes) = frame_bytes.split_at(HEADER_SIZE + len);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if compute_crc32(body) != stored_crc {
            break;
        }

        let corrupted = |message: String| StoreError::Corrupted {
            offset: pos as u64,
            message,
        };

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != JOURNAL_VERSION {
            return Err(corrupted(format!("unsupported frame version {}", version)));
        }
        let kind = FrameKind::from_byte(header[6])
            .ok_or_else(|| corrupted(format!("unknown frame kind {}", header[6])))?;
        let mutations: Vec<Mutation> = ciborium::from_reader(&body[HEADER_SIZE..])
            .map_err(|e| corrupted(e.to_string()))?;

        frames.push(Frame { kind, mutations });
        pos = end;
    }

    Ok(Replay {
        frames,
        valid_len: pos as u64,
    })
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(id: &str, text: &str) -> Mutation {
        Mutation::Put {
            collection: Collection::Meta,
            id: id.into(),
            value: ciborium::Value::Text(text.into()),
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_replay_in_order() {
        let mut bytes = encode_frame(FrameKind::Commit, &[put("a", "1")]).unwrap();
        bytes.extend(encode_frame(FrameKind::Snapshot, &[put("b", "2")]).unwrap());

        let replay = replay(&bytes).unwrap();
        assert_eq!(replay.frames.len(), 2);
        assert_eq!(replay.frames[0].kind, FrameKind::Commit);
        assert_eq!(replay.frames[1].kind, FrameKind::Snapshot);
        assert_eq!(replay.frames[1].mutations, vec![put("b", "2")]);
        assert!(!replay.has_torn_tail(bytes.len() as u64));
    }

    #[test]
    fn torn_tail_is_cut_off() {
        let first = encode_frame(FrameKind::Commit, &[put("a", "1")]).unwrap();
        let second = encode_frame(FrameKind::Commit, &[put("b", "2")]).unwrap();

        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let replay = replay(&bytes).unwrap();
        assert_eq!(replay.frames.len(), 1);
        assert_eq!(replay.valid_len, first.len() as u64);
        assert!(replay.has_torn_tail(bytes.len() as u64));
    }

    #[test]
    fn checksum_mismatch_stops_replay() {
        let mut bytes = encode_frame(FrameKind::Commit, &[put("a", "1")]).unwrap();
        let last_payload_byte = bytes.len() - CRC_SIZE - 1;
        bytes[last_payload_byte] ^= 0xFF;

        let replay = replay(&bytes).unwrap();
        assert!(replay.frames.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn unknown_kind_with_valid_checksum_is_corruption() {
        let mut bytes = encode_frame(FrameKind::Commit, &[]).unwrap();
        bytes[6] = 9;
        let crc_at = bytes.len() - CRC_SIZE;
        let crc = compute_crc32(&bytes[..crc_at]);
        bytes[crc_at..].copy_from_slice(&crc.to_le_bytes());

        let result = replay(&bytes);
        assert!(matches!(result, Err(StoreError::Corrupted { offset: 0, .. })));
    }
}
