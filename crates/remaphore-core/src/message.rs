//! C4: Message record and canonical wire codec (spec §4.4).
//!
//! Ported from `original_source/src/protocol/msg.go`: the canonical
//! pre-image, the `sender_pubkey,sender_signature,<pre-image>` wire form,
//! and the encode/decode state machines are all a direct line-for-line
//! translation of that file's `encode`/`decodeMessage`.

use crate::keys;
use crate::model::{Config, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
use crate::Error;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

const SEP: char = ',';
const UUID_LEN: usize = 12;
const REQUEST_CODE: &str = "Q";
const NO_REQUEST_CODE: &str = "_";

/// Wire record (spec §3 Message).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub sender_public_key: [u8; PUBLIC_KEY_SIZE],
    pub sender_signature: [u8; 64],
    pub destination: String,
    pub request_reply: bool,
    pub send_time_nanos: i64,
    pub uuid: Vec<u8>,
    pub verb: String,
    pub payload: String,
    /// SHA-256 of the encoded wire bytes. Not part of the wire form itself;
    /// populated by `encode`/`decode` and used to derive the reply subject.
    pub hash: [u8; 32],
}

/// Fields supplied by the caller to build a new outgoing message. `sender`
/// defaults to the config's default key when `None`.
#[derive(Clone, Debug, Default)]
pub struct NewMessage {
    pub sender: Option<[u8; PUBLIC_KEY_SIZE]>,
    pub destination: String,
    pub request_reply: bool,
    pub uuid: Vec<u8>,
    pub verb: String,
    pub payload: String,
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `NewUUID`: random 12 bytes if absent, SHA-256-truncated if longer than
/// 12 bytes, passed through unchanged otherwise.
pub fn normalize_uuid(uuid: &[u8]) -> Vec<u8> {
    if uuid.is_empty() {
        let mut bytes = [0u8; UUID_LEN];
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        return bytes.to_vec();
    }
    if uuid.len() > UUID_LEN {
        return sha256(uuid)[..UUID_LEN].to_vec();
    }
    uuid.to_vec()
}

/// Format a signed 64-bit integer as lowercase hex the way Go's
/// `strconv.FormatInt(v, 16)` does: an optional leading `-`, no padding.
fn format_signed_hex(v: i64) -> String {
    if v < 0 {
        format!("-{:x}", (v as i128).unsigned_abs())
    } else {
        format!("{:x}", v)
    }
}

/// Inverse of `format_signed_hex`.
fn parse_signed_hex(s: &str) -> Option<i64> {
    if let Some(rest) = s.strip_prefix('-') {
        let magnitude = i128::from_str_radix(rest, 16).ok()?;
        i64::try_from(-magnitude).ok()
    } else {
        i64::from_str_radix(s, 16).ok()
    }
}

impl Message {
    fn request_reply_field(&self) -> &'static str {
        if self.request_reply {
            REQUEST_CODE
        } else {
            NO_REQUEST_CODE
        }
    }

    /// The canonical bytes the signature covers.
    fn pre_image(&self) -> Vec<u8> {
        [
            self.destination.as_str(),
            &format_signed_hex(self.send_time_nanos),
            &hex::encode(&self.uuid),
            self.verb.as_str(),
            self.request_reply_field(),
            self.payload.as_str(),
        ]
        .join(&SEP.to_string())
        .into_bytes()
    }

    /// Encode an original (non-reply) message: §4.4 Encode(config, false).
    /// Returns the wire bytes together with their SHA-256 content hash,
    /// used to derive the reply subject for requests.
    pub fn encode(new: NewMessage, config: &Config) -> Result<(Vec<u8>, [u8; 32]), Error> {
        encode_inner(new, config, false)
    }

    /// Encode a reply message: §4.4 Encode(config, true). Forces
    /// `request_reply = false` regardless of the caller's input.
    pub fn encode_reply(new: NewMessage, config: &Config) -> Result<(Vec<u8>, [u8; 32]), Error> {
        encode_inner(new, config, true)
    }

    /// Decode an original (non-reply) message: §4.4 Decode(config, bytes, false).
    pub fn decode(config: &Config, bytes: &[u8]) -> Result<Message, Error> {
        decode_inner(config, bytes, false)
    }

    /// Decode a reply message: §4.4 Decode(config, bytes, true). Clears
    /// `request_reply` on the returned message regardless of the wire value.
    pub fn decode_reply(config: &Config, bytes: &[u8]) -> Result<Message, Error> {
        decode_inner(config, bytes, true)
    }
}

fn encode_inner(
    mut new: NewMessage,
    config: &Config,
    is_reply: bool,
) -> Result<(Vec<u8>, [u8; 32]), Error> {
    if new.destination.contains(SEP) {
        return Err(Error::DestinationBadChar);
    }
    if new.verb.contains(SEP) {
        return Err(Error::VerbBadChar);
    }

    let sender = new.sender.unwrap_or(config.default_key);

    let private_key: &[u8; PRIVATE_KEY_SIZE] = if is_reply {
        new.request_reply = false;
        config.private_key(&sender, None)
    } else {
        config.private_key(&sender, Some(&new.verb))
    }
    .ok_or(Error::NoPrivateKey)?;

    let send_time_nanos = now_nanos();
    let uuid = normalize_uuid(&new.uuid);

    let msg = Message {
        sender_public_key: sender,
        sender_signature: [0u8; 64], // filled below
        destination: new.destination,
        request_reply: new.request_reply,
        send_time_nanos,
        uuid,
        verb: new.verb,
        payload: new.payload,
        hash: [0u8; 32],
    };

    let pre_image = msg.pre_image();
    let signature = keys::sign(private_key, &pre_image);

    let mut encoded = Vec::with_capacity(
        bs58::encode(sender).into_string().len()
            + bs58::encode(signature).into_string().len()
            + pre_image.len()
            + 2,
    );
    encoded.extend_from_slice(bs58::encode(sender).into_string().as_bytes());
    encoded.push(SEP as u8);
    encoded.extend_from_slice(bs58::encode(signature).into_string().as_bytes());
    encoded.push(SEP as u8);
    encoded.extend_from_slice(&pre_image);

    let hash = sha256(&encoded);
    Ok((encoded, hash))
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn decode_inner(config: &Config, bytes: &[u8], is_reply: bool) -> Result<Message, Error> {
    let text = std::str::from_utf8(bytes).map_err(|_| Error::Format)?;
    let parts: Vec<&str> = text.splitn(3, SEP).collect();
    if parts.len() != 3 {
        return Err(Error::Format);
    }
    let inner: Vec<&str> = parts[2].splitn(6, SEP).collect();
    if inner.len() != 6 {
        return Err(Error::Format);
    }

    let sender_public_key_vec = bs58::decode(parts[0]).into_vec().map_err(|_| Error::Format)?;
    let sender_public_key: [u8; PUBLIC_KEY_SIZE] = sender_public_key_vec
        .try_into()
        .map_err(|_| Error::Format)?;
    let sender_signature_vec = bs58::decode(parts[1]).into_vec().map_err(|_| Error::Format)?;
    let sender_signature: [u8; 64] = sender_signature_vec.try_into().map_err(|_| Error::Format)?;

    let send_time_nanos = parse_signed_hex(inner[1]).ok_or(Error::Format)?;
    let uuid = hex::decode(inner[2]).map_err(|_| Error::Format)?;

    let mut msg = Message {
        sender_public_key,
        sender_signature,
        destination: inner[0].to_string(),
        request_reply: inner[4] == REQUEST_CODE,
        send_time_nanos,
        uuid,
        verb: inner[3].to_string(),
        payload: inner[5].to_string(),
        hash: sha256(bytes),
    };

    // Permission check (spec §4.4 step 6).
    if is_reply {
        if !config.peer_known(&msg.sender_public_key, None) {
            return Err(Error::PeerPermission);
        }
        msg.request_reply = false;
    } else if !config.peer_known(&msg.sender_public_key, Some(&msg.verb)) {
        return Err(Error::PeerPermission);
    }

    // Signature verification (step 7).
    if !keys::verify(&msg.sender_public_key, &msg.pre_image(), &msg.sender_signature) {
        return Err(Error::Signature);
    }

    // Clock skew (step 8).
    let now = now_nanos();
    let delta = now.abs_diff(msg.send_time_nanos);
    if delta > config.allowed_clock_skew.as_nanos() as u64 {
        return Err(Error::ClockSkew);
    }

    Ok(msg)
}
