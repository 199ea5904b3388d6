//! Group membership shared by every member of a threshold key.

use std::collections::HashSet;
use std::fmt;

use crate::error::{TssError, TssResult};

/// Opaque identifier of a group member.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(Vec<u8>);

impl MemberId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberId({})", self)
    }
}

impl From<Vec<u8>> for MemberId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for MemberId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.as_bytes().to_vec())
    }
}

/// Who takes part in an execution, and how many of them may be dishonest.
///
/// Built once through [`GroupInfo::new`] and never mutated. Every member of
/// the group holds an identical copy except for `member_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    group_id: String,
    member_id: MemberId,
    group_member_ids: Vec<MemberId>,
    dishonest_threshold: u32,
}

impl GroupInfo {
    /// Validate and build group information.
    ///
    /// A group needs at least two members and must be strictly larger than
    /// the dishonest threshold. The local member must be listed exactly once.
    pub fn new(
        group_id: impl Into<String>,
        member_id: MemberId,
        group_member_ids: Vec<MemberId>,
        dishonest_threshold: u32,
    ) -> TssResult<Self> {
        let group_size = group_member_ids.len();
        if group_size < 2 {
            return Err(TssError::InvalidGroupSize { size: group_size });
        }
        if group_size <= dishonest_threshold as usize {
            return Err(TssError::ThresholdTooLarge {
                group_size,
                threshold: dishonest_threshold,
            });
        }

        let mut unique = HashSet::with_capacity(group_size);
        for member in &group_member_ids {
            if !unique.insert(member) {
                return Err(TssError::DuplicateMember {
                    member: member.clone(),
                });
            }
        }
        if !unique.contains(&member_id) {
            return Err(TssError::MemberNotInGroup { member: member_id });
        }

        Ok(Self {
            group_id: group_id.into(),
            member_id,
            group_member_ids,
            dishonest_threshold,
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// The local member.
    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn group_member_ids(&self) -> &[MemberId] {
        &self.group_member_ids
    }

    pub fn dishonest_threshold(&self) -> u32 {
        self.dishonest_threshold
    }

    pub fn group_size(&self) -> usize {
        self.group_member_ids.len()
    }

    /// Smallest number of cooperating members able to sign.
    pub fn quorum_size(&self) -> usize {
        self.dishonest_threshold as usize + 1
    }

    pub fn is_member(&self, member: &MemberId) -> bool {
        self.group_member_ids.contains(member)
    }

    /// Position of `member` in the group member list.
    pub fn member_index(&self, member: &MemberId) -> Option<usize> {
        self.group_member_ids.iter().position(|m| m == member)
    }

    /// Every member except the local one.
    pub fn peers(&self) -> impl Iterator<Item = &MemberId> {
        self.group_member_ids
            .iter()
            .filter(move |member| **member != self.member_id)
    }
}
