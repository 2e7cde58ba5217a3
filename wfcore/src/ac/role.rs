use serde::{Deserialize, Serialize};

/// Tenant-level role of a user.
///
/// The variants are declared in ascending order of privilege, so the
/// derived ordering is the role hierarchy: a role satisfies every
/// requirement at or below it.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // catch-all for whenever infallable conversion is needed
    #[default]
    Undefined,
    Viewer,
    Editor,
    Admin,
}

mod impls;
