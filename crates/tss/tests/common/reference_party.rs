//! Reference parties over k256.
//!
//! Key generation is Feldman VSS: every member deals a degree-t polynomial,
//! broadcasts commitments to its coefficients and sends each peer its share.
//! Signing has every participant broadcast its Lagrange-weighted share, so
//! the key is reassembled at each participant before a deterministic
//! RFC 6979 signature is produced. That makes it a test double only.

use std::collections::{BTreeMap, BTreeSet};

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use tss::{
    BigNum, CurvePoint, GroupInfo, KeygenProtocol, LocalPreParams, LocalSecrets, MemberId,
    OutboundMessage, PaillierPrivateKey, PaillierPublicKey, Party, PartyError, ProtocolMessage,
    Signature, SigningProtocol, ThresholdKey, ThresholdSigner, DIGEST_LENGTH,
};

/// How a reference party deviates from the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Honest,
    /// Deal shares that do not match the broadcast commitments.
    CorruptShares,
    /// Never send anything after starting.
    Silent,
    /// Return the high-S twin of the signature it computes.
    HighS,
}

pub fn scalar_from_bytes(bytes: &[u8]) -> Option<Scalar> {
    if bytes.len() != 32 {
        return None;
    }
    Option::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
}

fn scalar_from_bignum(value: &BigNum) -> Option<Scalar> {
    scalar_from_bytes(&value.to_be_bytes_padded(32)?)
}

fn bignum_from_scalar(value: &Scalar) -> BigNum {
    BigNum::from_be_bytes(value.to_bytes().as_slice())
}

fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

fn decode_point(bytes: &[u8]) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).ok()?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded)).map(ProjectivePoint::from)
}

fn share_id(index: usize) -> Scalar {
    Scalar::from(index as u64 + 1)
}

fn random_int(len: usize) -> BigNum {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] |= 0x80;
    BigNum::from_be_bytes(&bytes)
}

/// The same signature with `s` replaced by `n - s`.
pub fn high_s_twin(signature: &Signature) -> Signature {
    let s = scalar_from_bytes(&signature.s).expect("signature s in range");
    let mut high = [0u8; 32];
    high.copy_from_slice(&(-s).to_bytes());
    Signature {
        r: signature.r,
        s: high,
        recovery_id: signature.recovery_id ^ 1,
    }
}

/// Stand-in pre-parameters with realistic sizes. Not real safe-prime material.
pub fn reference_pre_params() -> LocalPreParams {
    LocalPreParams {
        paillier_sk: PaillierPrivateKey {
            public_key: PaillierPublicKey { n: random_int(256) },
            lambda_n: random_int(255),
            phi_n: random_int(256),
        },
        n_tilde: random_int(256),
        h1: random_int(256),
        h2: random_int(256),
    }
}

/// Evaluate the committed polynomial at `x` in the exponent.
fn eval_commitments(commitments: &[ProjectivePoint], x: &Scalar) -> ProjectivePoint {
    let mut power = Scalar::ONE;
    let mut acc = ProjectivePoint::IDENTITY;
    for commitment in commitments {
        acc += *commitment * power;
        power *= x;
    }
    acc
}

#[derive(Serialize, Deserialize)]
enum KeygenRound {
    Commitments {
        coefficients: Vec<Vec<u8>>,
        paillier_n: Vec<u8>,
        n_tilde: Vec<u8>,
        h1: Vec<u8>,
        h2: Vec<u8>,
    },
    Share {
        value: Vec<u8>,
    },
}

struct Dealing {
    commitments: Vec<ProjectivePoint>,
    paillier_n: BigNum,
    n_tilde: BigNum,
    h1: BigNum,
    h2: BigNum,
}

#[derive(Debug, Clone, Copy)]
pub struct ReferenceKeygen {
    pub behavior: Behavior,
}

impl ReferenceKeygen {
    pub fn honest() -> Self {
        Self {
            behavior: Behavior::Honest,
        }
    }
}

impl KeygenProtocol for ReferenceKeygen {
    type Party = KeygenParty;

    fn initialize(
        &self,
        group: &GroupInfo,
        pre_params: Option<LocalPreParams>,
    ) -> Result<KeygenParty, PartyError> {
        let index = group
            .member_index(group.member_id())
            .ok_or_else(|| PartyError::failure("local member missing from group"))?;
        Ok(KeygenParty {
            group: group.clone(),
            index,
            behavior: self.behavior,
            pre_params,
            coefficients: Vec::new(),
            dealings: BTreeMap::new(),
            shares: BTreeMap::new(),
            verified: BTreeSet::new(),
            outbound: Vec::new(),
        })
    }
}

pub struct KeygenParty {
    group: GroupInfo,
    index: usize,
    behavior: Behavior,
    /// Stand-ins are generated in `start` when none were supplied.
    pre_params: Option<LocalPreParams>,
    coefficients: Vec<Scalar>,
    dealings: BTreeMap<usize, Dealing>,
    shares: BTreeMap<usize, Scalar>,
    verified: BTreeSet<usize>,
    outbound: Vec<OutboundMessage>,
}

impl KeygenParty {
    fn evaluate(&self, x: &Scalar) -> Scalar {
        let mut power = Scalar::ONE;
        let mut acc = Scalar::ZERO;
        for coefficient in &self.coefficients {
            acc += *coefficient * power;
            power *= x;
        }
        acc
    }

    fn try_verify(&mut self, dealer: usize) -> Result<(), PartyError> {
        let (Some(dealing), Some(share)) = (self.dealings.get(&dealer), self.shares.get(&dealer))
        else {
            return Ok(());
        };
        let expected = eval_commitments(&dealing.commitments, &share_id(self.index));
        if ProjectivePoint::GENERATOR * share != expected {
            return Err(PartyError::failure(format!(
                "share from {} does not match its commitments",
                self.group.group_member_ids()[dealer]
            )));
        }
        self.verified.insert(dealer);
        Ok(())
    }
}

impl Party for KeygenParty {
    type Output = ThresholdKey;

    fn start(&mut self) -> Result<(), PartyError> {
        let pre_params = self
            .pre_params
            .get_or_insert_with(reference_pre_params)
            .clone();
        let degree = self.group.dishonest_threshold() as usize;
        self.coefficients = (0..=degree).map(|_| Scalar::random(&mut OsRng)).collect();

        let commitments: Vec<ProjectivePoint> = self
            .coefficients
            .iter()
            .map(|c| ProjectivePoint::GENERATOR * c)
            .collect();
        let round = KeygenRound::Commitments {
            coefficients: commitments.iter().map(encode_point).collect(),
            paillier_n: pre_params.paillier_sk.public_key.n.as_be_bytes().to_vec(),
            n_tilde: pre_params.n_tilde.as_be_bytes().to_vec(),
            h1: pre_params.h1.as_be_bytes().to_vec(),
            h2: pre_params.h2.as_be_bytes().to_vec(),
        };
        self.dealings.insert(
            self.index,
            Dealing {
                commitments,
                paillier_n: pre_params.paillier_sk.public_key.n.clone(),
                n_tilde: pre_params.n_tilde.clone(),
                h1: pre_params.h1.clone(),
                h2: pre_params.h2.clone(),
            },
        );
        let own_share = self.evaluate(&share_id(self.index));
        self.shares.insert(self.index, own_share);
        self.verified.insert(self.index);

        if self.behavior == Behavior::Silent {
            return Ok(());
        }

        let encoded = bincode::serialize(&round).map_err(PartyError::failure)?;
        self.outbound.push(OutboundMessage::broadcast(encoded));

        let peers: Vec<(usize, MemberId)> = self
            .group
            .group_member_ids()
            .iter()
            .cloned()
            .enumerate()
            .filter(|(i, _)| *i != self.index)
            .collect();
        for (i, peer) in peers {
            let mut share = self.evaluate(&share_id(i));
            if self.behavior == Behavior::CorruptShares {
                share += Scalar::ONE;
            }
            let round = KeygenRound::Share {
                value: share.to_bytes().to_vec(),
            };
            let encoded = bincode::serialize(&round).map_err(PartyError::failure)?;
            self.outbound.push(OutboundMessage::to_member(peer, encoded));
        }
        Ok(())
    }

    fn feed(&mut self, message: ProtocolMessage) -> Result<(), PartyError> {
        let sender = message.sender_id.clone();
        let dealer = self
            .group
            .member_index(&sender)
            .ok_or_else(|| PartyError::unexpected(&sender, "not a group member"))?;
        let round: KeygenRound = bincode::deserialize(&message.payload)
            .map_err(|e| PartyError::unexpected(&sender, e.to_string()))?;

        match round {
            KeygenRound::Commitments {
                coefficients,
                paillier_n,
                n_tilde,
                h1,
                h2,
            } => {
                if self.dealings.contains_key(&dealer) {
                    return Err(PartyError::unexpected(&sender, "commitments already received"));
                }
                let commitments = coefficients
                    .iter()
                    .map(|bytes| decode_point(bytes))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| PartyError::failure("invalid commitment point"))?;
                if commitments.len() != self.coefficients.len() {
                    return Err(PartyError::failure(format!(
                        "{} committed to {} coefficients",
                        sender,
                        commitments.len()
                    )));
                }
                let int = |bytes: &[u8]| {
                    BigNum::from_canonical_bytes(bytes).map_err(PartyError::failure)
                };
                self.dealings.insert(
                    dealer,
                    Dealing {
                        commitments,
                        paillier_n: int(&paillier_n)?,
                        n_tilde: int(&n_tilde)?,
                        h1: int(&h1)?,
                        h2: int(&h2)?,
                    },
                );
            }
            KeygenRound::Share { value } => {
                if message.is_broadcast {
                    return Err(PartyError::unexpected(&sender, "share sent as broadcast"));
                }
                if self.shares.contains_key(&dealer) {
                    return Err(PartyError::unexpected(&sender, "share already received"));
                }
                let share = scalar_from_bytes(&value)
                    .ok_or_else(|| PartyError::failure("invalid share scalar"))?;
                self.shares.insert(dealer, share);
            }
        }
        self.try_verify(dealer)
    }

    fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbound)
    }

    fn is_complete(&self) -> bool {
        self.verified.len() == self.group.group_size()
    }

    fn result(&mut self) -> Result<ThresholdKey, PartyError> {
        if !self.is_complete() {
            return Err(PartyError::failure("key generation incomplete"));
        }
        let local_pre_params = self
            .pre_params
            .clone()
            .ok_or_else(|| PartyError::failure("key generation not started"))?;
        let n = self.group.group_size();
        let xi: Scalar = self.shares.values().copied().sum();
        let ecdsa_pub: ProjectivePoint = self
            .dealings
            .values()
            .map(|dealing| dealing.commitments[0])
            .sum();
        let big_x_j = (0..n)
            .map(|m| {
                let x = share_id(m);
                let point: ProjectivePoint = self
                    .dealings
                    .values()
                    .map(|dealing| eval_commitments(&dealing.commitments, &x))
                    .sum();
                CurvePoint::from(point)
            })
            .collect();

        let dealings: Vec<&Dealing> = self.dealings.values().collect();
        Ok(ThresholdKey {
            local_pre_params,
            local_secrets: LocalSecrets {
                xi: bignum_from_scalar(&xi),
                share_id: bignum_from_scalar(&share_id(self.index)),
            },
            ks: (0..n).map(|m| bignum_from_scalar(&share_id(m))).collect(),
            n_tilde_j: dealings.iter().map(|d| d.n_tilde.clone()).collect(),
            h1_j: dealings.iter().map(|d| d.h1.clone()).collect(),
            h2_j: dealings.iter().map(|d| d.h2.clone()).collect(),
            big_x_j,
            paillier_pks: dealings
                .iter()
                .map(|d| PaillierPublicKey {
                    n: d.paillier_n.clone(),
                })
                .collect(),
            ecdsa_pub: CurvePoint::from(ecdsa_pub),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReferenceSigning {
    pub behavior: Behavior,
}

impl ReferenceSigning {
    pub fn honest() -> Self {
        Self {
            behavior: Behavior::Honest,
        }
    }
}

impl SigningProtocol for ReferenceSigning {
    type Party = SigningParty;

    fn initialize(
        &self,
        signer: &ThresholdSigner,
        signing_group: &GroupInfo,
        digest: &[u8; DIGEST_LENGTH],
    ) -> Result<SigningParty, PartyError> {
        let key = signer.threshold_key();
        let key_group = signer.group_info();

        let participant_id = |member: &MemberId| -> Result<Scalar, PartyError> {
            let index = key_group
                .member_index(member)
                .ok_or_else(|| PartyError::failure(format!("{} holds no share", member)))?;
            key.ks
                .get(index)
                .and_then(scalar_from_bignum)
                .ok_or_else(|| PartyError::failure(format!("no share id for {}", member)))
        };

        let own_id = participant_id(signing_group.member_id())?;
        let mut lambda = Scalar::ONE;
        for peer in signing_group.peers() {
            let peer_id = participant_id(peer)?;
            let denominator = Option::<Scalar>::from((peer_id - own_id).invert())
                .ok_or_else(|| PartyError::failure("repeated share id"))?;
            lambda *= peer_id * denominator;
        }
        let xi = scalar_from_bignum(&key.local_secrets.xi)
            .ok_or_else(|| PartyError::failure("secret share out of range"))?;

        Ok(SigningParty {
            group: signing_group.clone(),
            behavior: self.behavior,
            public_key: ProjectivePoint::from(*signer.public_key().as_affine()),
            digest: *digest,
            weighted_share: lambda * xi,
            received: BTreeMap::new(),
            outbound: Vec::new(),
        })
    }
}

pub struct SigningParty {
    group: GroupInfo,
    behavior: Behavior,
    public_key: ProjectivePoint,
    digest: [u8; DIGEST_LENGTH],
    weighted_share: Scalar,
    received: BTreeMap<MemberId, Scalar>,
    outbound: Vec<OutboundMessage>,
}

impl Party for SigningParty {
    type Output = Signature;

    fn start(&mut self) -> Result<(), PartyError> {
        if self.behavior != Behavior::Silent {
            self.outbound.push(OutboundMessage::broadcast(
                self.weighted_share.to_bytes().to_vec(),
            ));
        }
        Ok(())
    }

    fn feed(&mut self, message: ProtocolMessage) -> Result<(), PartyError> {
        let sender = message.sender_id;
        if !self.group.is_member(&sender) {
            return Err(PartyError::unexpected(&sender, "not a signing participant"));
        }
        if self.received.contains_key(&sender) {
            return Err(PartyError::unexpected(&sender, "share already received"));
        }
        let share = scalar_from_bytes(&message.payload)
            .ok_or_else(|| PartyError::unexpected(&sender, "malformed weighted share"))?;
        self.received.insert(sender, share);
        Ok(())
    }

    fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbound)
    }

    fn is_complete(&self) -> bool {
        self.received.len() == self.group.group_size() - 1
    }

    fn result(&mut self) -> Result<Signature, PartyError> {
        let secret: Scalar = self.weighted_share + self.received.values().copied().sum::<Scalar>();
        if ProjectivePoint::GENERATOR * secret != self.public_key {
            return Err(PartyError::failure(
                "reconstructed key does not match the group public key",
            ));
        }
        let signing_key = SigningKey::from_bytes(&secret.to_bytes()).map_err(PartyError::failure)?;
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&self.digest)
            .map_err(PartyError::failure)?;
        let signature = Signature::from_k256(&signature, recovery_id);
        if self.behavior == Behavior::HighS {
            return Ok(high_s_twin(&signature));
        }
        Ok(signature)
    }
}
