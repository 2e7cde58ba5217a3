use std::{
    fmt,
    str::FromStr,
};
use crate::error::ValueError;
use super::Role;

impl Role {
    /// Whether this role meets the `required` minimum.  `Undefined`
    /// never satisfies anything, not even an `Undefined` requirement.
    pub fn satisfies(&self, required: Role) -> bool {
        *self != Role::Undefined && *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(*self))
    }
}

impl From<Role> for &'static str {
    fn from(role: Role) -> &'static str {
        match role {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::Undefined => "undefined",
        }
    }
}

impl FromStr for Role {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            // Undefined,
            s => Err(ValueError::Unsupported(s.to_string())),
        }
    }
}

#[cfg(feature = "clap")]
mod clap {
    use ::clap::{
        ValueEnum,
        builder::PossibleValue,
    };
    use super::*;

    impl ValueEnum for Role {
        fn value_variants<'a>() -> &'a [Self] {
            &[
                Role::Viewer,
                Role::Editor,
                Role::Admin,
            ]
        }

        fn to_possible_value(&self) -> Option<PossibleValue> {
            match self {
                Role::Undefined => None,
                role => Some(PossibleValue::new(<&'static str>::from(*role))),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use super::Role;
    use crate::error::ValueError;

    #[test]
    fn smoke() -> anyhow::Result<()> {
        // sample of standard conversions
        assert_eq!(Role::Editor.to_string(), "editor");
        assert_eq!(Role::Editor, Role::from_str("editor")?);
        assert_eq!(Role::Admin, Role::from_str("Admin")?);

        // error conversion
        assert!(Role::from_str("undefined").is_err());
        assert!(matches!(
            Role::from_str("no_such_role")
                .expect_err("should be an error"),
            ValueError::Unsupported(s) if s == "no_such_role".to_string(),
        ));

        // infallable conversion
        assert_eq!(
            Role::from_str("no_such_role")
                .unwrap_or_default(),
            Role::Undefined,
        );
        Ok(())
    }

    #[test]
    fn hierarchy() {
        assert!(Role::Admin.satisfies(Role::Editor));
        assert!(Role::Editor.satisfies(Role::Editor));
        assert!(!Role::Viewer.satisfies(Role::Editor));
        assert!(Role::Viewer.satisfies(Role::Viewer));
        assert!(!Role::Undefined.satisfies(Role::Viewer));
        assert!(!Role::Undefined.satisfies(Role::Undefined));
    }
}
