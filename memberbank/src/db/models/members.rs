//! Database models for members.

use crate::types::{MemberId, Money};
use serde::{Deserialize, Serialize};

/// Database representation of a member row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub member_id: MemberId,
    pub money: Money,
}

impl Member {
    pub fn new(member_id: impl Into<MemberId>, money: Money) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }
}

/// Database request for creating a new member
#[derive(Debug, Clone)]
pub struct MemberCreateDBRequest {
    pub member_id: MemberId,
    pub money: Money,
}

impl From<&Member> for MemberCreateDBRequest {
    fn from(member: &Member) -> Self {
        Self {
            member_id: member.member_id.clone(),
            money: member.money,
        }
    }
}

/// Database request for updating a member. The balance is replaced, not adjusted.
#[derive(Debug, Clone)]
pub struct MemberUpdateDBRequest {
    pub money: Money,
}

/// Response from database after creating, reading or updating a member
pub type MemberDBResponse = Member;
