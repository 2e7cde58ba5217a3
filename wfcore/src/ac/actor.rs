use serde::{Deserialize, Serialize};

use super::Role;

/// The authenticated caller of a platform operation.
///
/// Establishing who the actor is happens outside of this crate; the
/// platform trusts the identity and role it is given.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl From<(i64, Role)> for Actor {
    fn from((user_id, role): (i64, Role)) -> Self {
        Self { user_id, role }
    }
}
