//! Distributed key generation.

use std::sync::Arc;

use common::{EventType, LogEvent};
use tracing::{info, warn};

use crate::config::TssConfig;
use crate::error::{TssError, TssResult};
use crate::execution::{execute, ExecutionKind, ExecutionSettings};
use crate::group::GroupInfo;
use crate::key::{LocalPreParams, ThresholdSigner};
use crate::party::KeygenProtocol;
use crate::transport::Transport;

/// Runs key generation for the local member.
pub struct KeyGenerator<K> {
    protocol: K,
    transport: Arc<dyn Transport>,
    config: TssConfig,
}

impl<K: KeygenProtocol> KeyGenerator<K> {
    pub fn new(protocol: K, transport: Arc<dyn Transport>, config: TssConfig) -> Self {
        Self {
            protocol,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &TssConfig {
        &self.config
    }

    /// Generate a threshold key together with every other group member.
    ///
    /// All members must call this with equal `group_info` (apart from the
    /// local member id) at roughly the same time; the whole execution, join
    /// included, is bounded by the key generation timeout. An invalid
    /// configuration is rejected before any network activity.
    ///
    /// Without `pre_params` the protocol has to generate them itself, which
    /// can take long enough to exhaust the deadline.
    pub async fn generate(
        &self,
        group_info: GroupInfo,
        pre_params: Option<LocalPreParams>,
    ) -> TssResult<ThresholdSigner> {
        self.config.validate()?;
        if pre_params.is_none() {
            if self.config.require_pre_params {
                return Err(TssError::MissingPreParams);
            }
            warn!(
                "Pre-parameters not provided for group {}; they will be generated during key generation",
                group_info.group_id()
            );
            LogEvent::new(EventType::PreParamsMissing)
                .with_correlation_id(group_info.group_id())
                .with_member(group_info.member_id().to_string())
                .emit();
        }

        info!("========================================");
        info!("  Key generation: group {}", group_info.group_id());
        info!(
            "  Member {} of {}, threshold {}",
            group_info.member_id(),
            group_info.group_size(),
            group_info.dishonest_threshold()
        );
        info!("========================================");

        let group = Arc::new(group_info);
        let settings = ExecutionSettings {
            kind: ExecutionKind::KeyGeneration,
            timeout: self.config.keygen_timeout(),
            join_retransmit_interval: self.config.join_retransmit_interval(),
        };
        let threshold_key = execute(settings, group.clone(), self.transport.clone(), |group| {
            self.protocol.initialize(group, pre_params)
        })
        .await?;

        info!(
            "Generated threshold key for group {}: {:?}",
            group.group_id(),
            threshold_key.ecdsa_pub
        );
        Ok(ThresholdSigner::new(
            Arc::unwrap_or_clone(group),
            threshold_key,
        ))
    }
}
