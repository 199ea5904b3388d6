//! Common test utilities and infrastructure for integration tests.

#![allow(dead_code)]

pub mod reference_party;

use std::sync::Arc;

use futures::future::join_all;
use tracing_subscriber::EnvFilter;

use tss::{
    GroupInfo, InMemoryNetwork, KeyGenerator, MemberId, Signer, ThresholdSigner, TssConfig,
    TssResult,
};

use reference_party::{reference_pre_params, Behavior, ReferenceKeygen, ReferenceSigning};

pub const GROUP_ID: &str = "wallet-test";

/// Initialize test logging once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Short timeouts and a fast join retransmit for tests.
pub fn test_config() -> TssConfig {
    TssConfig {
        keygen_timeout_secs: 10,
        signing_timeout_secs: 10,
        join_retransmit_interval_ms: 50,
        ..TssConfig::default()
    }
}

pub fn member_ids(count: usize) -> Vec<MemberId> {
    (0..count)
        .map(|i| MemberId::from(format!("member-{}", i).as_str()))
        .collect()
}

/// A group of members sharing one in-memory network.
pub struct Cluster {
    pub network: InMemoryNetwork,
    pub members: Vec<MemberId>,
    pub threshold: u32,
    pub config: TssConfig,
}

impl Cluster {
    pub fn new(size: usize, threshold: u32) -> Self {
        init_tracing();
        Self {
            network: InMemoryNetwork::new(),
            members: member_ids(size),
            threshold,
            config: test_config(),
        }
    }

    pub fn with_config(mut self, config: TssConfig) -> Self {
        self.config = config;
        self
    }

    /// Group information as seen by member `index`.
    pub fn group(&self, index: usize) -> GroupInfo {
        GroupInfo::new(
            GROUP_ID,
            self.members[index].clone(),
            self.members.clone(),
            self.threshold,
        )
        .expect("valid test group")
    }

    pub fn key_generator(&self, index: usize, behavior: Behavior) -> KeyGenerator<ReferenceKeygen> {
        KeyGenerator::new(
            ReferenceKeygen { behavior },
            self.network.transport(self.members[index].clone()),
            self.config.clone(),
        )
    }

    pub fn signer(&self, index: usize, behavior: Behavior) -> Signer<ReferenceSigning> {
        Signer::new(
            ReferenceSigning { behavior },
            self.network.transport(self.members[index].clone()),
            self.config.clone(),
        )
    }

    /// Run key generation at the given members concurrently.
    pub async fn run_keygen(
        &self,
        participants: &[(usize, Behavior)],
    ) -> Vec<TssResult<ThresholdSigner>> {
        let runs = participants.iter().map(|&(index, behavior)| {
            let generator = self.key_generator(index, behavior);
            let group = self.group(index);
            async move { generator.generate(group, Some(reference_pre_params())).await }
        });
        join_all(runs).await
    }

    /// Honest key generation at every member.
    pub async fn generate_keys(&self) -> Vec<ThresholdSigner> {
        let everyone: Vec<(usize, Behavior)> =
            (0..self.members.len()).map(|i| (i, Behavior::Honest)).collect();
        self.run_keygen(&everyone)
            .await
            .into_iter()
            .map(|result| result.expect("key generation should succeed"))
            .collect()
    }

    /// Sign `digest` at the given key holders, all using the same participant set.
    pub async fn run_signing(
        &self,
        signers: &[ThresholdSigner],
        participants: &[usize],
        digest: &[u8],
    ) -> Vec<TssResult<tss::Signature>> {
        self.run_signing_as(signers, participants, digest, Behavior::Honest)
            .await
    }

    /// Like [`Cluster::run_signing`], with every participant behaving as `behavior`.
    pub async fn run_signing_as(
        &self,
        signers: &[ThresholdSigner],
        participants: &[usize],
        digest: &[u8],
        behavior: Behavior,
    ) -> Vec<TssResult<tss::Signature>> {
        let participant_ids: Arc<Vec<MemberId>> = Arc::new(
            participants
                .iter()
                .map(|&i| self.members[i].clone())
                .collect(),
        );
        let runs = participants.iter().map(|&index| {
            let signing = self.signer(index, behavior);
            let key = signers[index].clone();
            let participant_ids = participant_ids.clone();
            let digest = digest.to_vec();
            async move {
                signing
                    .sign_with_participants(&key, &digest, &participant_ids)
                    .await
            }
        });
        join_all(runs).await
    }
}
