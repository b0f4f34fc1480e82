//! Cursor codec: opaque, authenticated keyset-pagination tokens
//! (spec.md §4.5).
//!
//! Grounded on `fraiseql-server::encryption::FieldEncryption` — the
//! `[nonce || ciphertext]` AES-256-GCM framing and constant-size nonce
//! convention are carried over verbatim; what's new here is the payload
//! shape (an ordering-column value tuple plus direction and `salt_id`,
//! spec.md §3.4) rather than an arbitrary field value.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use gqlsql_error::{CompileError, CursorErrorKind, Result};

use crate::qcode::{ScalarValue, SortDirection};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// A single AEAD key identified by a rotation id (spec.md §9 "Cursor
/// secret rotation").
#[derive(Clone)]
struct Secret {
    salt_id: u32,
    key: [u8; KEY_SIZE],
}

/// Holds the current cursor-signing key plus, during a rotation window,
/// the previous one — cursors minted under either still decode
/// (SPEC_FULL §C).
#[derive(Clone)]
pub struct CursorSecretRing {
    current: Secret,
    previous: Option<Secret>,
}

impl CursorSecretRing {
    /// Start a ring with a single active secret.
    #[must_use]
    pub fn new(salt_id: u32, key: [u8; KEY_SIZE]) -> Self {
        Self { current: Secret { salt_id, key }, previous: None }
    }

    /// Rotate in a new secret, retaining the previous one for decoding only.
    pub fn rotate(&mut self, new_salt_id: u32, new_key: [u8; KEY_SIZE]) {
        let old = std::mem::replace(&mut self.current, Secret { salt_id: new_salt_id, key: new_key });
        self.previous = Some(old);
    }

    fn key_for_salt(&self, salt_id: u32) -> Option<&[u8; KEY_SIZE]> {
        if self.current.salt_id == salt_id {
            return Some(&self.current.key);
        }
        self.previous.as_ref().filter(|s| s.salt_id == salt_id).map(|s| &s.key)
    }
}

/// Direction a cursor was minted for, mirrored into the decoded payload
/// so `decode` can validate it was used with the matching `before`/`after` arg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    /// Minted for an `after:` (forward) cursor.
    Forward,
    /// Minted for a `before:` (backward) cursor.
    Backward,
}

/// Encode an ordering-column value tuple into an opaque, authenticated,
/// base64url cursor token.
///
/// # Errors
/// Returns [`CompileError::Cursor`] only if the ring has no current key
/// material (never happens for a ring built via [`CursorSecretRing::new`]).
pub fn encode(ring: &CursorSecretRing, values: &[ScalarValue], direction: CursorDirection) -> Result<String> {
    let payload = serialize_payload(values, direction, ring.current.salt_id);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&ring.current.key));
    let nonce_bytes = deterministic_nonce(&payload, ring.current.salt_id);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, payload.as_slice())
        .map_err(|_| CompileError::cursor(CursorErrorKind::Tampered))?;

    // `salt_id` travels in cleartext ahead of the nonce, the same way a
    // JWT `kid` does, so decode can pick the right key before attempting
    // to authenticate; it carries no secret material itself.
    let mut framed = Vec::with_capacity(4 + NONCE_SIZE + ciphertext.len());
    framed.extend_from_slice(&ring.current.salt_id.to_be_bytes());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(framed))
}

/// Decode and authenticate a cursor token, checking the decoded tuple's
/// arity against `expected_arity`.
///
/// # Errors
/// - [`CursorErrorKind::Tampered`] if the token is malformed or the
///   authentication tag does not verify.
/// - [`CursorErrorKind::ArityMismatch`] if the decoded tuple's length
///   differs from `expected_arity`.
pub fn decode(
    ring: &CursorSecretRing,
    token: &str,
    expected_arity: usize,
) -> Result<(Vec<ScalarValue>, CursorDirection)> {
    let framed = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CompileError::cursor(CursorErrorKind::Tampered))?;
    if framed.len() < 4 + NONCE_SIZE {
        return Err(CompileError::cursor(CursorErrorKind::Tampered));
    }
    let (salt_bytes, rest) = framed.split_at(4);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
    let salt_id = u32::from_be_bytes(salt_bytes.try_into().expect("split_at(4) guarantees length 4"));

    let key = ring
        .key_for_salt(salt_id)
        .ok_or_else(|| CompileError::cursor(CursorErrorKind::Tampered))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    let payload = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CompileError::cursor(CursorErrorKind::Tampered))?;

    let (values, direction) = deserialize_payload(&payload)?;
    if values.len() != expected_arity {
        return Err(CompileError::cursor(CursorErrorKind::ArityMismatch));
    }
    Ok((values, direction))
}

/// A synthetic empty cursor, emitted when a page is the last page
/// (spec.md §4.5).
#[must_use]
pub const fn empty_sentinel() -> &'static str {
    ""
}

fn deterministic_nonce(payload: &[u8], salt_id: u32) -> [u8; NONCE_SIZE] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(salt_id.to_be_bytes());
    hasher.update(payload);
    let digest = hasher.finalize();
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

fn serialize_payload(values: &[ScalarValue], direction: CursorDirection, salt_id: u32) -> Vec<u8> {
    let dto = CursorDto {
        values: values.iter().map(ScalarDto::from).collect(),
        direction: direction == CursorDirection::Forward,
        salt_id,
    };
    serde_json::to_vec(&dto).expect("cursor payload is always serializable")
}

fn deserialize_payload(bytes: &[u8]) -> Result<(Vec<ScalarValue>, CursorDirection)> {
    let dto: CursorDto = serde_json::from_slice(bytes)
        .map_err(|_| CompileError::cursor(CursorErrorKind::Tampered))?;
    let direction = if dto.direction { CursorDirection::Forward } else { CursorDirection::Backward };
    let values = dto.values.into_iter().map(ScalarValue::from).collect();
    Ok((values, direction))
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CursorDto {
    values: Vec<ScalarDto>,
    direction: bool,
    salt_id: u32,
}

#[derive(serde::Serialize, serde::Deserialize)]
enum ScalarDto {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

impl From<&ScalarValue> for ScalarDto {
    fn from(v: &ScalarValue) -> Self {
        match v {
            ScalarValue::Int(n) => Self::Int(*n),
            ScalarValue::Float(f) => Self::Float(*f),
            ScalarValue::String(s) => Self::String(s.clone()),
            ScalarValue::Bool(b) => Self::Bool(*b),
            ScalarValue::Null | ScalarValue::Variable(_) | ScalarValue::List(_) => Self::Null,
        }
    }
}

impl From<ScalarDto> for ScalarValue {
    fn from(v: ScalarDto) -> Self {
        match v {
            ScalarDto::Int(n) => Self::Int(n),
            ScalarDto::Float(f) => Self::Float(f),
            ScalarDto::String(s) => Self::String(s),
            ScalarDto::Bool(b) => Self::Bool(b),
            ScalarDto::Null => Self::Null,
        }
    }
}

/// Resolve the `order_by` directions into a cursor direction for the
/// predicate comparison: `after` pages compare strictly greater in the
/// declared order, `before` pages strictly less (spec.md §4.4.1).
#[must_use]
pub fn keyset_comparison_dir(order: &[(String, SortDirection)], cursor_dir: CursorDirection) -> &'static str {
    let primary_desc = order.first().is_some_and(|(_, dir)| *dir == SortDirection::Desc);
    match (primary_desc, cursor_dir) {
        (false, CursorDirection::Forward) | (true, CursorDirection::Backward) => ">",
        _ => "<",
    }
}
