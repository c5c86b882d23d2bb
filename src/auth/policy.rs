use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Role granted to an account. The first registered account is `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Allow iff `actual` is one of `required`. An absent role is always denied.
pub fn authorize(required: &[Role], actual: Option<Role>) -> Decision {
    match actual {
        Some(role) if required.contains(&role) => Decision::Allow,
        _ => Decision::Deny,
    }
}

/// Operations that sit behind a role check. Register, login and user lookup by id
/// are public and never consult this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListUsers,
    CurrentUser,
}

const SIGNED_IN: &[Role] = &[Role::User, Role::Admin];

/// Roles a caller needs before the operation is dispatched.
pub fn required_roles(op: Operation) -> &'static [Role] {
    match op {
        Operation::ListUsers | Operation::CurrentUser => SIGNED_IN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Option<Role> {
        s.parse().ok()
    }

    #[test]
    fn authorize_truth_table() {
        assert_eq!(authorize(&[Role::User, Role::Admin], parse("admin")), Decision::Allow);
        assert_eq!(authorize(&[Role::User, Role::Admin], parse("user")), Decision::Allow);
        assert_eq!(authorize(&[Role::Admin], parse("user")), Decision::Deny);
        assert_eq!(authorize(&[Role::Admin], parse("")), Decision::Deny);
        assert_eq!(authorize(&[Role::Admin], None), Decision::Deny);
        assert_eq!(authorize(&[], Some(Role::Admin)), Decision::Deny);
    }

    #[test]
    fn role_parsing_is_closed() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("Admin".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let r: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(r, Role::User);
    }

    #[test]
    fn guarded_operations_require_a_signed_in_role() {
        for op in [Operation::ListUsers, Operation::CurrentUser] {
            let roles = required_roles(op);
            assert_eq!(authorize(roles, Some(Role::User)), Decision::Allow);
            assert_eq!(authorize(roles, Some(Role::Admin)), Decision::Allow);
            assert_eq!(authorize(roles, None), Decision::Deny);
        }
    }
}
