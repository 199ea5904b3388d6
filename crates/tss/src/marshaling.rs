//! Wire and storage encoding.
//!
//! Values are mapped onto plain records and encoded with bincode. Every
//! record field is bytes, strings, fixed-size integers or lists of those, so
//! the encoding of a given value is unique:
//!
//! ```text
//! Frame          { type_tag: String, body: bytes }
//! ProtocolBody   { sender_id: bytes, payload: bytes, is_broadcast: bool }
//! SignalBody     { sender_id: bytes }                    (join, announce)
//! SignerRecord   { version: u32, group_info: GroupInfoRecord, threshold_key: bytes }
//! ```
//!
//! Integers are canonical big-endian, curve points fixed-width 65-byte SEC1.
//! Decoding rejects trailing bytes.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{TssError, TssResult};
use crate::group::{GroupInfo, MemberId};
use crate::key::{
    BigNum, CurvePoint, LocalPreParams, LocalSecrets, PaillierPrivateKey, PaillierPublicKey,
    ThresholdKey, ThresholdSigner,
};
use crate::message::{AnnounceMessage, Envelope, JoinMessage, NetMessage, ProtocolMessage};

/// Maximum encoded envelope size (16 MB).
pub const MAX_ENVELOPE_SIZE: usize = 16 * 1024 * 1024;

/// Current version of the stored signer record.
const SIGNER_RECORD_VERSION: u32 = 1;

/// Fixed-width little-endian integers, no trailing input.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn serialize<T: Serialize>(value: &T) -> bincode::Result<Vec<u8>> {
    codec().serialize(value)
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> bincode::Result<T> {
    codec().deserialize(bytes)
}

#[derive(Serialize, Deserialize)]
struct Frame {
    type_tag: String,
    body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct ProtocolBody {
    sender_id: Vec<u8>,
    payload: Vec<u8>,
    is_broadcast: bool,
}

#[derive(Serialize, Deserialize)]
struct SignalBody {
    sender_id: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SignerRecord {
    version: u32,
    group_info: GroupInfoRecord,
    threshold_key: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct GroupInfoRecord {
    group_id: String,
    member_id: Vec<u8>,
    group_member_ids: Vec<Vec<u8>>,
    dishonest_threshold: i32,
}

#[derive(Serialize, Deserialize)]
struct ThresholdKeyRecord {
    local_pre_params: PreParamsRecord,
    local_secrets: SecretsRecord,
    ks: Vec<Vec<u8>>,
    n_tilde_j: Vec<Vec<u8>>,
    h1_j: Vec<Vec<u8>>,
    h2_j: Vec<Vec<u8>>,
    big_x_j: Vec<Vec<u8>>,
    paillier_pks: Vec<Vec<u8>>,
    ecdsa_pub: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PreParamsRecord {
    paillier_n: Vec<u8>,
    lambda_n: Vec<u8>,
    phi_n: Vec<u8>,
    n_tilde: Vec<u8>,
    h1: Vec<u8>,
    h2: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SecretsRecord {
    xi: Vec<u8>,
    share_id: Vec<u8>,
}

impl NetMessage for ProtocolMessage {
    const TYPE: &'static str = "ecdsa/tss_message";

    fn marshal(&self) -> TssResult<Vec<u8>> {
        Ok(serialize(&ProtocolBody {
            sender_id: self.sender_id.as_bytes().to_vec(),
            payload: self.payload.clone(),
            is_broadcast: self.is_broadcast,
        })?)
    }

    fn unmarshal(bytes: &[u8]) -> TssResult<Self> {
        let body: ProtocolBody = deserialize(bytes)?;
        Ok(Self {
            sender_id: MemberId::new(body.sender_id),
            payload: body.payload,
            is_broadcast: body.is_broadcast,
        })
    }
}

impl NetMessage for JoinMessage {
    const TYPE: &'static str = "ecdsa/join_message";

    fn marshal(&self) -> TssResult<Vec<u8>> {
        marshal_signal(&self.sender_id)
    }

    fn unmarshal(bytes: &[u8]) -> TssResult<Self> {
        Ok(Self {
            sender_id: unmarshal_signal(bytes)?,
        })
    }
}

impl NetMessage for AnnounceMessage {
    const TYPE: &'static str = "ecdsa/announce_message";

    fn marshal(&self) -> TssResult<Vec<u8>> {
        marshal_signal(&self.sender_id)
    }

    fn unmarshal(bytes: &[u8]) -> TssResult<Self> {
        Ok(Self {
            sender_id: unmarshal_signal(bytes)?,
        })
    }
}

fn marshal_signal(sender_id: &MemberId) -> TssResult<Vec<u8>> {
    Ok(serialize(&SignalBody {
        sender_id: sender_id.as_bytes().to_vec(),
    })?)
}

fn unmarshal_signal(bytes: &[u8]) -> TssResult<MemberId> {
    let body: SignalBody = deserialize(bytes)?;
    Ok(MemberId::new(body.sender_id))
}

impl Envelope {
    /// Encode into a type-tagged frame.
    pub fn encode(&self) -> TssResult<Vec<u8>> {
        let body = match self {
            Self::Protocol(message) => message.marshal()?,
            Self::Join(message) => message.marshal()?,
            Self::Announce(message) => message.marshal()?,
        };
        let frame = serialize(&Frame {
            type_tag: self.type_tag().to_string(),
            body,
        })?;

        if frame.len() > MAX_ENVELOPE_SIZE {
            return Err(TssError::Codec(format!(
                "envelope too large: {} bytes (max {})",
                frame.len(),
                MAX_ENVELOPE_SIZE
            )));
        }
        Ok(frame)
    }

    /// Decode a frame, dispatching on its type tag.
    ///
    /// An unknown tag is reported as [`TssError::UnexpectedMessage`].
    pub fn decode(bytes: &[u8]) -> TssResult<Self> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(TssError::Codec(format!(
                "envelope too large: {} bytes (max {})",
                bytes.len(),
                MAX_ENVELOPE_SIZE
            )));
        }
        let frame: Frame = deserialize(bytes)?;

        match frame.type_tag.as_str() {
            tag if tag == ProtocolMessage::TYPE => {
                Ok(Self::Protocol(ProtocolMessage::unmarshal(&frame.body)?))
            }
            tag if tag == JoinMessage::TYPE => Ok(Self::Join(JoinMessage::unmarshal(&frame.body)?)),
            tag if tag == AnnounceMessage::TYPE => {
                Ok(Self::Announce(AnnounceMessage::unmarshal(&frame.body)?))
            }
            other => Err(TssError::UnexpectedMessage(format!(
                "unknown message type [{}]",
                other
            ))),
        }
    }
}

impl ThresholdSigner {
    /// Encode for persistence.
    pub fn marshal(&self) -> TssResult<Vec<u8>> {
        let group = self.group_info();
        let dishonest_threshold = i32::try_from(group.dishonest_threshold()).map_err(|_| {
            TssError::Codec(format!(
                "dishonest threshold [{}] does not fit the record",
                group.dishonest_threshold()
            ))
        })?;

        let record = SignerRecord {
            version: SIGNER_RECORD_VERSION,
            group_info: GroupInfoRecord {
                group_id: group.group_id().to_string(),
                member_id: group.member_id().as_bytes().to_vec(),
                group_member_ids: group
                    .group_member_ids()
                    .iter()
                    .map(|member| member.as_bytes().to_vec())
                    .collect(),
                dishonest_threshold,
            },
            threshold_key: marshal_threshold_key(self.threshold_key())?,
        };
        Ok(serialize(&record)?)
    }

    /// Decode a persisted signer. The group information is validated again.
    pub fn unmarshal(bytes: &[u8]) -> TssResult<Self> {
        let record: SignerRecord = deserialize(bytes)?;
        if record.version != SIGNER_RECORD_VERSION {
            return Err(TssError::Codec(format!(
                "unsupported signer record version [{}]",
                record.version
            )));
        }

        let threshold = u32::try_from(record.group_info.dishonest_threshold).map_err(|_| {
            TssError::Codec(format!(
                "negative dishonest threshold [{}]",
                record.group_info.dishonest_threshold
            ))
        })?;
        let group_info = GroupInfo::new(
            record.group_info.group_id,
            MemberId::new(record.group_info.member_id),
            record
                .group_info
                .group_member_ids
                .into_iter()
                .map(MemberId::new)
                .collect(),
            threshold,
        )?;

        let threshold_key = unmarshal_threshold_key(&record.threshold_key)?;
        Ok(Self::new(group_info, threshold_key))
    }
}

fn marshal_threshold_key(key: &ThresholdKey) -> TssResult<Vec<u8>> {
    let pre_params = &key.local_pre_params;
    let record = ThresholdKeyRecord {
        local_pre_params: PreParamsRecord {
            paillier_n: int_bytes(&pre_params.paillier_sk.public_key.n),
            lambda_n: int_bytes(&pre_params.paillier_sk.lambda_n),
            phi_n: int_bytes(&pre_params.paillier_sk.phi_n),
            n_tilde: int_bytes(&pre_params.n_tilde),
            h1: int_bytes(&pre_params.h1),
            h2: int_bytes(&pre_params.h2),
        },
        local_secrets: SecretsRecord {
            xi: int_bytes(&key.local_secrets.xi),
            share_id: int_bytes(&key.local_secrets.share_id),
        },
        ks: int_list(&key.ks),
        n_tilde_j: int_list(&key.n_tilde_j),
        h1_j: int_list(&key.h1_j),
        h2_j: int_list(&key.h2_j),
        big_x_j: key.big_x_j.iter().map(CurvePoint::to_bytes).collect(),
        paillier_pks: key.paillier_pks.iter().map(|pk| int_bytes(&pk.n)).collect(),
        ecdsa_pub: key.ecdsa_pub.to_bytes(),
    };
    Ok(serialize(&record)?)
}

fn unmarshal_threshold_key(bytes: &[u8]) -> TssResult<ThresholdKey> {
    let record: ThresholdKeyRecord = deserialize(bytes)?;
    let pre_params = record.local_pre_params;

    Ok(ThresholdKey {
        local_pre_params: LocalPreParams {
            paillier_sk: PaillierPrivateKey {
                public_key: PaillierPublicKey {
                    n: BigNum::from_canonical_bytes(&pre_params.paillier_n)?,
                },
                lambda_n: BigNum::from_canonical_bytes(&pre_params.lambda_n)?,
                phi_n: BigNum::from_canonical_bytes(&pre_params.phi_n)?,
            },
            n_tilde: BigNum::from_canonical_bytes(&pre_params.n_tilde)?,
            h1: BigNum::from_canonical_bytes(&pre_params.h1)?,
            h2: BigNum::from_canonical_bytes(&pre_params.h2)?,
        },
        local_secrets: LocalSecrets {
            xi: BigNum::from_canonical_bytes(&record.local_secrets.xi)?,
            share_id: BigNum::from_canonical_bytes(&record.local_secrets.share_id)?,
        },
        ks: parse_int_list(&record.ks)?,
        n_tilde_j: parse_int_list(&record.n_tilde_j)?,
        h1_j: parse_int_list(&record.h1_j)?,
        h2_j: parse_int_list(&record.h2_j)?,
        big_x_j: record
            .big_x_j
            .iter()
            .map(|bytes| CurvePoint::from_bytes(bytes))
            .collect::<TssResult<_>>()?,
        paillier_pks: record
            .paillier_pks
            .iter()
            .map(|bytes| {
                Ok(PaillierPublicKey {
                    n: BigNum::from_canonical_bytes(bytes)?,
                })
            })
            .collect::<TssResult<_>>()?,
        ecdsa_pub: CurvePoint::from_bytes(&record.ecdsa_pub)?,
    })
}

fn int_bytes(value: &BigNum) -> Vec<u8> {
    value.as_be_bytes().to_vec()
}

fn int_list(values: &[BigNum]) -> Vec<Vec<u8>> {
    values.iter().map(int_bytes).collect()
}

fn parse_int_list(values: &[Vec<u8>]) -> TssResult<Vec<BigNum>> {
    values
        .iter()
        .map(|bytes| BigNum::from_canonical_bytes(bytes))
        .collect()
}
