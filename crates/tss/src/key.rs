//! Key material produced by key generation and consumed by signing.
//!
//! Integers are kept as canonical big-endian byte strings ([`BigNum`]) and
//! curve points as secp256k1 affine points ([`CurvePoint`]). Both have a
//! single valid byte encoding, which is what the codec in
//! [`crate::marshaling`] relies on for deterministic output.

use std::fmt;

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, VerifyingKey};
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::scalar::IsHigh;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};

use crate::error::{TssError, TssResult};
use crate::group::{GroupInfo, MemberId};

/// Length in bytes of a digest accepted for signing on secp256k1.
pub const DIGEST_LENGTH: usize = 32;

/// Non-negative arbitrary-precision integer in canonical big-endian form.
///
/// Zero is the single byte `0x00`; no other value carries a leading zero.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BigNum(Vec<u8>);

impl BigNum {
    pub fn zero() -> Self {
        Self(vec![0])
    }

    /// Build from big-endian bytes, dropping redundant leading zeros.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|b| *b != 0);
        match first {
            Some(index) => Self(bytes[index..].to_vec()),
            None => Self::zero(),
        }
    }

    /// Parse an encoding that must already be canonical.
    pub fn from_canonical_bytes(bytes: &[u8]) -> TssResult<Self> {
        match bytes {
            [] => Err(TssError::Codec("empty integer encoding".into())),
            [0, _, ..] => Err(TssError::Codec(
                "integer encoding has a leading zero byte".into(),
            )),
            _ => Ok(Self(bytes.to_vec())),
        }
    }

    pub fn as_be_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0]
    }

    /// Big-endian bytes left padded to `len`, or `None` if the value does not fit.
    pub fn to_be_bytes_padded(&self, len: usize) -> Option<Vec<u8>> {
        let value = if self.is_zero() { &[][..] } else { &self.0[..] };
        if value.len() > len {
            return None;
        }
        let mut out = vec![0u8; len - value.len()];
        out.extend_from_slice(value);
        Some(out)
    }
}

impl From<u64> for BigNum {
    fn from(value: u64) -> Self {
        Self::from_be_bytes(&value.to_be_bytes())
    }
}

impl fmt::Debug for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigNum(0x{})", hex::encode(&self.0))
    }
}

/// A point on secp256k1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint(AffinePoint);

impl CurvePoint {
    /// Length of the uncompressed SEC1 encoding of a non-identity point.
    pub const ENCODED_LEN: usize = 65;

    pub fn from_affine(point: AffinePoint) -> Self {
        Self(point)
    }

    pub fn as_affine(&self) -> &AffinePoint {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == AffinePoint::IDENTITY
    }

    /// Fixed-width uncompressed SEC1 encoding; the identity is the single
    /// SEC1 identity byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> TssResult<Self> {
        if bytes.len() != Self::ENCODED_LEN && bytes != [0] {
            return Err(TssError::Codec(format!(
                "curve point should be {} bytes but got: [{}]",
                Self::ENCODED_LEN,
                bytes.len()
            )));
        }
        let encoded = EncodedPoint::from_bytes(bytes)
            .map_err(|e| TssError::Codec(format!("invalid curve point: {}", e)))?;
        Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
            .map(Self)
            .ok_or_else(|| TssError::Codec("curve point is not on secp256k1".into()))
    }
}

impl From<AffinePoint> for CurvePoint {
    fn from(point: AffinePoint) -> Self {
        Self(point)
    }
}

impl From<ProjectivePoint> for CurvePoint {
    fn from(point: ProjectivePoint) -> Self {
        Self(point.to_affine())
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compressed = self.0.to_encoded_point(true);
        write!(f, "CurvePoint({})", hex::encode(compressed.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaillierPublicKey {
    pub n: BigNum,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PaillierPrivateKey {
    pub public_key: PaillierPublicKey,
    pub lambda_n: BigNum,
    pub phi_n: BigNum,
}

impl fmt::Debug for PaillierPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierPrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Expensive per-member parameters generated ahead of key generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPreParams {
    pub paillier_sk: PaillierPrivateKey,
    pub n_tilde: BigNum,
    pub h1: BigNum,
    pub h2: BigNum,
}

/// The local member's secret share and its share id.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalSecrets {
    pub xi: BigNum,
    pub share_id: BigNum,
}

impl fmt::Debug for LocalSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSecrets")
            .field("share_id", &self.share_id)
            .finish_non_exhaustive()
    }
}

/// Output of key generation for one member.
///
/// Per-member lists are ordered like the group member list of the key
/// generation that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdKey {
    pub local_pre_params: LocalPreParams,
    pub local_secrets: LocalSecrets,
    /// Share ids of every member.
    pub ks: Vec<BigNum>,
    pub n_tilde_j: Vec<BigNum>,
    pub h1_j: Vec<BigNum>,
    pub h2_j: Vec<BigNum>,
    /// Public counterpart of every member's share.
    pub big_x_j: Vec<CurvePoint>,
    pub paillier_pks: Vec<PaillierPublicKey>,
    /// The group's ECDSA public key.
    pub ecdsa_pub: CurvePoint,
}

/// A member's durable handle on a threshold key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSigner {
    group_info: GroupInfo,
    threshold_key: ThresholdKey,
}

impl ThresholdSigner {
    pub fn new(group_info: GroupInfo, threshold_key: ThresholdKey) -> Self {
        Self {
            group_info,
            threshold_key,
        }
    }

    pub fn group_info(&self) -> &GroupInfo {
        &self.group_info
    }

    pub fn threshold_key(&self) -> &ThresholdKey {
        &self.threshold_key
    }

    pub fn group_id(&self) -> &str {
        self.group_info.group_id()
    }

    pub fn member_id(&self) -> &MemberId {
        self.group_info.member_id()
    }

    /// The group public key every member computed during key generation.
    pub fn public_key(&self) -> &CurvePoint {
        &self.threshold_key.ecdsa_pub
    }
}

/// ECDSA signature over secp256k1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes, big-endian)
    pub r: [u8; 32],
    /// s component (32 bytes, big-endian)
    pub s: [u8; 32],
    /// Recovery ID (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    pub fn from_k256(signature: &k256::ecdsa::Signature, recovery_id: RecoveryId) -> Self {
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self {
            r,
            s,
            recovery_id: recovery_id.to_byte(),
        }
    }

    /// `r || s`.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// DER encoding (SEQUENCE of two INTEGERs).
    pub fn to_der(&self) -> Vec<u8> {
        let r = der_integer(&self.r);
        let s = der_integer(&self.s);
        let body_len = 2 + r.len() + 2 + s.len();

        let mut der = Vec::with_capacity(2 + body_len);
        der.push(0x30);
        der.push(body_len as u8);
        der.push(0x02);
        der.push(r.len() as u8);
        der.extend_from_slice(&r);
        der.push(0x02);
        der.push(s.len() as u8);
        der.extend_from_slice(&s);
        der
    }

    /// The equivalent signature with `s` in the lower half of the group order.
    ///
    /// Negating `s` mirrors the nonce point, so the recovery id parity flips
    /// with it. Out-of-range values are returned unchanged.
    pub fn normalize_s(&self) -> Self {
        let repr = FieldBytes::clone_from_slice(&self.s);
        let Some(s) = Option::<Scalar>::from(Scalar::from_repr(repr)) else {
            return *self;
        };
        if !bool::from(s.is_high()) {
            return *self;
        }
        let mut low = [0u8; 32];
        low.copy_from_slice(&(-s).to_bytes());
        Self {
            r: self.r,
            s: low,
            recovery_id: self.recovery_id ^ 1,
        }
    }

    pub fn is_low_s(&self) -> bool {
        self.normalize_s().s == self.s
    }

    /// Check the signature against `public_key` for a prehashed `digest`.
    ///
    /// Both the low-S and the high-S form of a signature verify.
    pub fn verify(&self, public_key: &CurvePoint, digest: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_affine(*public_key.as_affine()) else {
            return false;
        };
        let Ok(signature) = k256::ecdsa::Signature::from_slice(&self.normalize_s().to_compact())
        else {
            return false;
        };
        verifying_key.verify_prehash(digest, &signature).is_ok()
    }
}

fn der_integer(bytes: &[u8; 32]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    let mut out = Vec::with_capacity(33);
    if bytes[start] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(&bytes[start..]);
    out
}
