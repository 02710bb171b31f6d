use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::error::AclError;
use super::permission::{PermissionSet, Profile};

/// Default permissions of the three built-in profiles.
///
/// Usually read from the server configuration, eg.
///
/// ```toml
/// owner = ["all", "read", "unlock", "read-acl", "read-current-user-privilege-set", "write-acl", "C:read-free-busy", "write", "write-properties", "write-content", "bind", "unbind"]
/// authenticated = ["C:read-free-busy"]
/// unauthenticated = []
/// share_read = ["read", "read-current-user-privilege-set", "C:read-free-busy"]
/// share_rw = ["read", "read-current-user-privilege-set", "C:read-free-busy", "write"]
/// ```
///
/// Other keys holding a list of privileges (`share_read`, `share_rw`...)
/// are kept as named sets, used when sharing a calendar with a principal.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileDefaults {
    pub owner: PermissionSet,
    pub authenticated: PermissionSet,
    pub unauthenticated: PermissionSet,
    #[serde(flatten)]
    pub named: BTreeMap<String, PermissionSet>,
}

/// Loosely typed shape, checked once when converted to `ProfileDefaults`
pub type RawProfileDefaults = HashMap<String, Vec<String>>;

/// Shape of a configuration table: the profile keys are required by
/// `ProfileDefaults`, anything else may share the table.
#[derive(Deserialize)]
struct RawTable {
    owner: Option<Vec<String>>,
    authenticated: Option<Vec<String>>,
    unauthenticated: Option<Vec<String>>,
    #[serde(flatten)]
    extra: HashMap<String, toml::Value>,
}

impl RawTable {
    fn into_raw(self) -> RawProfileDefaults {
        let profiles = [
            (Profile::Owner, self.owner),
            (Profile::Authenticated, self.authenticated),
            (Profile::Unauthenticated, self.unauthenticated),
        ];
        let mut raw: RawProfileDefaults = profiles
            .into_iter()
            .filter_map(|(p, v)| v.map(|v| (p.as_str().to_string(), v)))
            .collect();

        for (key, value) in self.extra {
            let tokens = match value {
                toml::Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>(),
                _ => None,
            };
            match tokens {
                Some(tokens) => {
                    raw.insert(key, tokens);
                }
                None => tracing::trace!(key = %key, "not a privilege list, ignored"),
            }
        }
        raw
    }
}

impl ProfileDefaults {
    pub fn new(
        owner: PermissionSet,
        authenticated: PermissionSet,
        unauthenticated: PermissionSet,
    ) -> Self {
        Self {
            owner,
            authenticated,
            unauthenticated,
            named: BTreeMap::new(),
        }
    }

    /// Parse a TOML table. Keys other than the profile names
    /// do not have to be privilege lists, so the table can be
    /// shared with other settings.
    pub fn from_toml(src: &str) -> Result<Self, AclError> {
        let table: RawTable = toml::from_str(src)
            .map_err(|e| AclError::InvalidConfiguration(e.to_string()))?;
        Self::try_from(table.into_raw())
    }

    pub fn get(&self, profile: Profile) -> &PermissionSet {
        match profile {
            Profile::Owner => &self.owner,
            Profile::Authenticated => &self.authenticated,
            Profile::Unauthenticated => &self.unauthenticated,
        }
    }

    pub fn set(&mut self, profile: Profile, perms: PermissionSet) {
        match profile {
            Profile::Owner => self.owner = perms,
            Profile::Authenticated => self.authenticated = perms,
            Profile::Unauthenticated => self.unauthenticated = perms,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Profile, &PermissionSet)> {
        Profile::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    /// A named set other than the profiles, eg. `share_read`
    pub fn named(&self, name: &str) -> Option<&PermissionSet> {
        self.named.get(name)
    }
}

impl TryFrom<RawProfileDefaults> for ProfileDefaults {
    type Error = AclError;

    fn try_from(mut raw: RawProfileDefaults) -> Result<Self, Self::Error> {
        let mut take = |profile: Profile| -> Result<PermissionSet, AclError> {
            let tokens = raw.remove(profile.as_str()).ok_or_else(|| {
                AclError::InvalidConfiguration(format!("missing profile {}", profile))
            })?;
            PermissionSet::parse(tokens).map_err(|e| {
                AclError::InvalidConfiguration(format!("profile {}: {}", profile, e))
            })
        };

        let owner = take(Profile::Owner)?;
        let authenticated = take(Profile::Authenticated)?;
        let unauthenticated = take(Profile::Unauthenticated)?;

        // lists of something else than privileges belong to other settings
        let named = raw
            .into_iter()
            .filter_map(|(key, tokens)| match PermissionSet::parse(tokens) {
                Ok(set) => Some((key, set)),
                Err(e) => {
                    tracing::trace!(key = %key, err = %e, "not a privilege list, ignored");
                    None
                }
            })
            .collect();

        Ok(Self {
            owner,
            authenticated,
            unauthenticated,
            named,
        })
    }
}

impl<'de> Deserialize<'de> for ProfileDefaults {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let table = RawTable::deserialize(deserializer)?;
        Self::try_from(table.into_raw()).map_err(serde::de::Error::custom)
    }
}

pub fn read_config(config_file: PathBuf) -> Result<ProfileDefaults> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_file.as_path())?;

    let mut config = String::new();
    file.read_to_string(&mut config)?;

    Ok(ProfileDefaults::from_toml(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_with_extra_keys() {
        let src = r#"
owner = ["read", "write"]
authenticated = ["read"]
unauthenticated = []
share_read = ["read", "C:read-free-busy"]
share_rw = ["read", "write"]
"#;
        let defaults = ProfileDefaults::from_toml(src).unwrap();
        assert_eq!(defaults.owner, PermissionSet::parse(["read", "write"]).unwrap());
        assert_eq!(defaults.authenticated, PermissionSet::parse(["read"]).unwrap());
        assert!(defaults.unauthenticated.is_empty());
        assert_eq!(
            defaults.named("share_read"),
            Some(&PermissionSet::parse(["read", "C:read-free-busy"]).unwrap())
        );
        assert!(defaults.named("owner").is_none());
    }

    #[test]
    fn toml_shared_with_other_settings() {
        let src = r#"
owner = []
authenticated = []
unauthenticated = []
port = 8080
listen = ["[::1]:8080"]
share_rw = ["read", "write"]

[storage]
driver = "memory"
"#;
        let defaults = ProfileDefaults::from_toml(src).unwrap();
        assert!(defaults.owner.is_empty());
        assert_eq!(defaults.named.len(), 1);
        assert_eq!(
            defaults.named("share_rw"),
            Some(&PermissionSet::parse(["read", "write"]).unwrap())
        );
    }

    #[test]
    fn every_profile_is_required() {
        for missing in Profile::ALL {
            let mut raw = RawProfileDefaults::new();
            for profile in Profile::ALL.into_iter().filter(|p| *p != missing) {
                raw.insert(profile.as_str().into(), vec!["read".into()]);
            }
            match ProfileDefaults::try_from(raw) {
                Err(AclError::InvalidConfiguration(msg)) => {
                    assert!(msg.contains(missing.as_str()), "{}", msg)
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
    }

    #[test]
    fn not_a_table_of_lists() {
        let src = r#"
owner = "read"
authenticated = []
unauthenticated = []
"#;
        assert!(matches!(
            ProfileDefaults::from_toml(src),
            Err(AclError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn invalid_token_is_a_configuration_error() {
        let src = r#"
owner = ["read write"]
authenticated = []
unauthenticated = []
"#;
        assert!(matches!(
            ProfileDefaults::from_toml(src),
            Err(AclError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn nested_in_a_larger_config() {
        #[derive(Deserialize)]
        struct ServerConfig {
            acl: ProfileDefaults,
        }

        let src = r#"
[acl]
owner = ["all"]
authenticated = []
unauthenticated = []
"#;
        let config: ServerConfig = toml::from_str(src).unwrap();
        assert_eq!(config.acl.owner, PermissionSet::parse(["all"]).unwrap());

        let broken = "[acl]\nowner = []\n";
        assert!(toml::from_str::<ServerConfig>(broken).is_err());
    }

    #[test]
    fn read_from_file() {
        let path = std::env::temp_dir().join(format!("caldav-acl-{}.toml", std::process::id()));
        std::fs::write(&path, "owner = []\nauthenticated = []\nunauthenticated = [\"read\"]\n")
            .unwrap();
        let defaults = read_config(path.clone()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(defaults.get(Profile::Unauthenticated).len(), 1);
    }
}
