use std::collections::HashSet;

use uuid::Uuid;

/// The set of users one account has blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    pub owner: Uuid,
    pub blocked: HashSet<Uuid>,
}

impl BlockList {
    pub fn new(owner: Uuid, blocked: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            owner,
            blocked: blocked.into_iter().collect(),
        }
    }

    pub fn blocks(&self, user_id: Uuid) -> bool {
        self.blocked.contains(&user_id)
    }
}

/// True if either side has blocked the other.
pub fn is_blocked(a: &BlockList, b: &BlockList) -> bool {
    a.blocks(b.owner) || b.blocks(a.owner)
}
