//! Wire Protocol
//!
//! Every message starts with a fixed header followed by a kind-specific body
//! made of 64-bit *noise-tolerant words*:
//!
//! ```text
//! header: kind u8 | sender.id i32 | sender.port i16
//! JoinRequest: heartbeat
//! JoinReply:   length | length * (id, port, heartbeat, last_update)
//! Gossip:      length | length * (id, port, heartbeat, last_update)
//! Fail:        failed.id | failed.port | ttl
//! JoinAck:     heartbeat | ttl
//! ```
//!
//! A word carries `value << noise_shift`; readers take `raw >> noise_shift`,
//! so whatever the transport leaves in the low bits is ignored. All integers
//! are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{MembershipError, Result};
use super::types::{Endpoint, MembershipEntry};

const HEADER_LEN: usize = 1 + 4 + 2;
const WORD_LEN: usize = 8;
const ENTRY_WORDS: usize = 4;

/// Message kind tags as they appear in the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    JoinRequest = 0,
    JoinReply = 1,
    Gossip = 2,
    Fail = 3,
    JoinAck = 4,
}

impl TryFrom<u8> for MessageKind {
    type Error = MembershipError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageKind::JoinRequest),
            1 => Ok(MessageKind::JoinReply),
            2 => Ok(MessageKind::Gossip),
            3 => Ok(MessageKind::Fail),
            4 => Ok(MessageKind::JoinAck),
            other => Err(MembershipError::UnknownKind(other)),
        }
    }
}

/// The five membership messages.
#[derive(Debug, Clone, PartialEq)]
pub enum GossipMessage {
    JoinRequest {
        sender: Endpoint,
        heartbeat: i64,
    },

    JoinReply {
        sender: Endpoint,
        snapshot: Vec<MembershipEntry>,
    },

    JoinAck {
        sender: Endpoint,
        heartbeat: i64,
        ttl: i64,
    },

    Gossip {
        sender: Endpoint,
        snapshot: Vec<MembershipEntry>,
    },

    Fail {
        sender: Endpoint,
        failed: Endpoint,
        ttl: i64,
    },
}

impl GossipMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            GossipMessage::JoinRequest { .. } => MessageKind::JoinRequest,
            GossipMessage::JoinReply { .. } => MessageKind::JoinReply,
            GossipMessage::JoinAck { .. } => MessageKind::JoinAck,
            GossipMessage::Gossip { .. } => MessageKind::Gossip,
            GossipMessage::Fail { .. } => MessageKind::Fail,
        }
    }

    pub fn sender(&self) -> Endpoint {
        match self {
            GossipMessage::JoinRequest { sender, .. }
            | GossipMessage::JoinReply { sender, .. }
            | GossipMessage::JoinAck { sender, .. }
            | GossipMessage::Gossip { sender, .. }
            | GossipMessage::Fail { sender, .. } => *sender,
        }
    }

    /// Hop budget of flooded messages.
    pub fn ttl(&self) -> Option<i64> {
        match self {
            GossipMessage::JoinAck { ttl, .. } | GossipMessage::Fail { ttl, .. } => Some(*ttl),
            _ => None,
        }
    }
}

/// Encodes and decodes [`GossipMessage`]s for one noise shift.
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    noise_shift: u32,
}

impl MessageCodec {
    pub fn new(noise_shift: u32) -> Self {
        Self { noise_shift }
    }

    pub fn encode(&self, msg: &GossipMessage) -> Bytes {
        let body_words = match msg {
            GossipMessage::JoinRequest { .. } => 1,
            GossipMessage::JoinReply { snapshot, .. } | GossipMessage::Gossip { snapshot, .. } => {
                1 + snapshot.len() * ENTRY_WORDS
            }
            GossipMessage::JoinAck { .. } => 2,
            GossipMessage::Fail { .. } => 3,
        };
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body_words * WORD_LEN);

        let sender = msg.sender();
        buf.put_u8(msg.kind() as u8);
        buf.put_i32(sender.id);
        buf.put_i16(sender.port);

        match msg {
            GossipMessage::JoinRequest { heartbeat, .. } => {
                self.put_word(&mut buf, *heartbeat);
            }
            GossipMessage::JoinReply { snapshot, .. } | GossipMessage::Gossip { snapshot, .. } => {
                self.put_word(&mut buf, snapshot.len() as i64);
                for entry in snapshot {
                    self.put_word(&mut buf, entry.endpoint.id as i64);
                    self.put_word(&mut buf, entry.endpoint.port as i64);
                    self.put_word(&mut buf, entry.heartbeat);
                    self.put_word(&mut buf, entry.last_update);
                }
            }
            GossipMessage::JoinAck { heartbeat, ttl, .. } => {
                self.put_word(&mut buf, *heartbeat);
                self.put_word(&mut buf, *ttl);
            }
            GossipMessage::Fail { failed, ttl, .. } => {
                self.put_word(&mut buf, failed.id as i64);
                self.put_word(&mut buf, failed.port as i64);
                self.put_word(&mut buf, *ttl);
            }
        }

        buf.freeze()
    }

    pub fn decode(&self, mut buf: &[u8]) -> Result<GossipMessage> {
        if buf.remaining() < HEADER_LEN {
            return Err(MembershipError::UnexpectedEnd);
        }
        let kind = MessageKind::try_from(buf.get_u8())?;
        let sender = Endpoint::new(buf.get_i32(), buf.get_i16());

        let msg = match kind {
            MessageKind::JoinRequest => GossipMessage::JoinRequest {
                sender,
                heartbeat: self.get_word(&mut buf)?,
            },
            MessageKind::JoinReply => GossipMessage::JoinReply {
                sender,
                snapshot: self.get_snapshot(&mut buf)?,
            },
            MessageKind::Gossip => GossipMessage::Gossip {
                sender,
                snapshot: self.get_snapshot(&mut buf)?,
            },
            MessageKind::JoinAck => GossipMessage::JoinAck {
                sender,
                heartbeat: self.get_word(&mut buf)?,
                ttl: self.get_word(&mut buf)?,
            },
            MessageKind::Fail => GossipMessage::Fail {
                sender,
                failed: self.get_endpoint(&mut buf)?,
                ttl: self.get_word(&mut buf)?,
            },
        };

        if buf.has_remaining() {
            return Err(MembershipError::TrailingBytes(buf.remaining()));
        }
        Ok(msg)
    }

    fn put_word(&self, buf: &mut BytesMut, value: i64) {
        buf.put_i64(value << self.noise_shift);
    }

    fn get_word(&self, buf: &mut &[u8]) -> Result<i64> {
        if buf.remaining() < WORD_LEN {
            return Err(MembershipError::UnexpectedEnd);
        }
        Ok(buf.get_i64() >> self.noise_shift)
    }

    fn get_endpoint(&self, buf: &mut &[u8]) -> Result<Endpoint> {
        let id = self.get_word(buf)?;
        let port = self.get_word(buf)?;
        Ok(Endpoint::new(
            i32::try_from(id).map_err(|_| MembershipError::OutOfRange(id))?,
            i16::try_from(port).map_err(|_| MembershipError::OutOfRange(port))?,
        ))
    }

    fn get_snapshot(&self, buf: &mut &[u8]) -> Result<Vec<MembershipEntry>> {
        let len = self.get_word(buf)?;
        if len < 0 {
            return Err(MembershipError::InvalidLength(len));
        }
        let len = len as usize;
        if len > buf.remaining() / (ENTRY_WORDS * WORD_LEN) {
            return Err(MembershipError::UnexpectedEnd);
        }

        let mut snapshot = Vec::with_capacity(len);
        for _ in 0..len {
            let endpoint = self.get_endpoint(buf)?;
            let heartbeat = self.get_word(buf)?;
            let last_update = self.get_word(buf)?;
            snapshot.push(MembershipEntry::new(endpoint, heartbeat, last_update));
        }
        Ok(snapshot)
    }
}

/// Validity filter for decoded snapshot entries.
///
/// Drops entries stamped in the future or before tick 0, with a non-positive
/// id, or with a negative heartbeat.
pub fn sanitize_snapshot(snapshot: Vec<MembershipEntry>, now: i64) -> Vec<MembershipEntry> {
    snapshot
        .into_iter()
        .filter(|entry| {
            entry.last_update <= now
                && entry.last_update >= 0
                && entry.endpoint.id > 0
                && entry.heartbeat >= 0
        })
        .collect()
}
