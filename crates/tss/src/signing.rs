//! Threshold signing.

use std::sync::Arc;

use tracing::info;

use crate::config::TssConfig;
use crate::error::{TssError, TssResult};
use crate::execution::{execute, ExecutionKind, ExecutionSettings};
use crate::group::{GroupInfo, MemberId};
use crate::key::{Signature, ThresholdSigner, DIGEST_LENGTH};
use crate::party::SigningProtocol;
use crate::transport::Transport;

/// Execution id of a signing, identical at every participant.
///
/// Concurrent signings of different digests under one key get distinct
/// routes; signing the same digest twice at once is not supported.
pub fn signing_execution_id(group_id: &str, digest: &[u8; DIGEST_LENGTH]) -> String {
    format!("{}/signing/{}", group_id, hex::encode(digest))
}

/// Runs signing executions for the local member.
pub struct Signer<S> {
    protocol: S,
    transport: Arc<dyn Transport>,
    config: TssConfig,
}

impl<S: SigningProtocol> Signer<S> {
    pub fn new(protocol: S, transport: Arc<dyn Transport>, config: TssConfig) -> Self {
        Self {
            protocol,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &TssConfig {
        &self.config
    }

    /// Sign `digest` together with every member of the key's group.
    pub async fn sign(&self, signer: &ThresholdSigner, digest: &[u8]) -> TssResult<Signature> {
        self.sign_with_participants(signer, digest, signer.group_info().group_member_ids())
            .await
    }

    /// Sign `digest` together with `participants`, which must include the
    /// local member and more than the dishonest threshold of members.
    ///
    /// Every participant must pass the same participant set. Arguments and
    /// configuration are validated before any network activity. The
    /// signature is returned in low-S form.
    pub async fn sign_with_participants(
        &self,
        signer: &ThresholdSigner,
        digest: &[u8],
        participants: &[MemberId],
    ) -> TssResult<Signature> {
        self.config.validate()?;
        let digest: [u8; DIGEST_LENGTH] =
            digest
                .try_into()
                .map_err(|_| TssError::InvalidDigestLength {
                    expected: DIGEST_LENGTH,
                    actual: digest.len(),
                })?;

        let key_group = signer.group_info();
        if let Some(outsider) = participants.iter().find(|p| !key_group.is_member(p)) {
            return Err(TssError::MemberNotInGroup {
                member: outsider.clone(),
            });
        }
        let signing_group = GroupInfo::new(
            signing_execution_id(key_group.group_id(), &digest),
            signer.member_id().clone(),
            participants.to_vec(),
            key_group.dishonest_threshold(),
        )?;

        info!(
            "Signing digest {} in group {} with {} of {} members",
            hex::encode(digest),
            key_group.group_id(),
            signing_group.group_size(),
            key_group.group_size()
        );

        let settings = ExecutionSettings {
            kind: ExecutionKind::Signing,
            timeout: self.config.signing_timeout(),
            join_retransmit_interval: self.config.join_retransmit_interval(),
        };
        let signature = execute(
            settings,
            Arc::new(signing_group),
            self.transport.clone(),
            |group| self.protocol.initialize(signer, group, &digest),
        )
        .await?
        .normalize_s();

        if !signature.verify(signer.public_key(), &digest) {
            return Err(TssError::protocol_failure(
                "signature does not verify against the group public key",
            ));
        }
        Ok(signature)
    }
}
