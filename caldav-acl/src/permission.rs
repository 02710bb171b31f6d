//! Privilege tokens and the three built-in principal classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AclError;

/// Prefix used to place a privilege in the CalDAV namespace,
/// eg. `C:read-free-busy`. Unprefixed tokens live in `DAV:`.
pub const CAL_PREFIX: &str = "C:";

/// A protocol-defined privilege name such as `read`, `write` or `read-acl`.
///
/// The name itself is opaque: it is only checked to be usable as the local
/// name of an XML element, since privileges are encoded as element names.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    pub fn new(token: impl Into<String>) -> Result<Self, AclError> {
        let token = token.into();
        let local = token.strip_prefix(CAL_PREFIX).unwrap_or(&token);
        if !is_local_name(local) {
            return Err(AclError::InvalidArgument(format!(
                "{:?} is not a valid privilege name",
                token
            )));
        }
        Ok(Self(token))
    }

    /// Whether this privilege is defined by CalDAV rather than WebDAV
    pub fn is_caldav(&self) -> bool {
        self.0.starts_with(CAL_PREFIX)
    }

    /// The element name without any namespace prefix
    pub fn local_name(&self) -> &str {
        self.0.strip_prefix(CAL_PREFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Permission {
    type Error = AclError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
impl TryFrom<&str> for Permission {
    type Error = AclError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}
impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// NCName, restricted to what can be checked without unicode tables
fn is_local_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = match chars.next() {
        Some(c) => c.is_alphabetic() || c == '_',
        None => false,
    };
    first_ok && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Ordered privileges granted to one principal.
/// Order only matters for the serialized output.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    pub fn new(perms: Vec<Permission>) -> Self {
        Self(perms)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate a list of raw tokens, failing on the first invalid one
    pub fn parse<I, S>(tokens: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tokens
            .into_iter()
            .map(Permission::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, perm: &str) -> bool {
        self.0.iter().any(|p| p.as_str() == perm)
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(value: Vec<Permission>) -> Self {
        Self(value)
    }
}
impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The built-in principal classes. Every ACL carries exactly one
/// permission set for each of them.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Profile {
    Owner,
    Authenticated,
    Unauthenticated,
}

impl Profile {
    /// Serialization order of the profile ACEs
    pub const ALL: [Profile; 3] = [Self::Owner, Self::Authenticated, Self::Unauthenticated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl FromStr for Profile {
    type Err = AclError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "authenticated" => Ok(Self::Authenticated),
            "unauthenticated" => Ok(Self::Unauthenticated),
            other => Err(AclError::InvalidArgument(format!(
                "{:?} is not a profile",
                other
            ))),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dav_and_caldav_tokens() {
        let read = Permission::new("read-acl").unwrap();
        assert!(!read.is_caldav());
        assert_eq!(read.local_name(), "read-acl");

        let fb = Permission::new("C:read-free-busy").unwrap();
        assert!(fb.is_caldav());
        assert_eq!(fb.local_name(), "read-free-busy");
    }

    #[test]
    fn rejects_tokens_that_are_not_element_names() {
        for bad in ["", "C:", "two words", "<read>", "1read", "-write", "D:read"] {
            assert!(
                matches!(Permission::new(bad), Err(AclError::InvalidArgument(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn permission_set_keeps_order_and_stops_on_first_error() {
        let set = PermissionSet::parse(["c", "a", "b"]).unwrap();
        let got: Vec<&str> = set.iter().map(Permission::as_str).collect();
        assert_eq!(got, vec!["c", "a", "b"]);

        assert!(PermissionSet::parse(["read", "not valid"]).is_err());
    }

    #[test]
    fn profile_names() {
        for profile in Profile::ALL {
            assert_eq!(profile.as_str().parse::<Profile>().unwrap(), profile);
        }
        assert!("principal".parse::<Profile>().is_err());
    }
}
