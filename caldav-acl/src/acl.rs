//! The ACL of a calendar collection: default permissions of the built-in
//! profiles plus explicit grants for individual principals.

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, Event};
use quick_xml::reader::NsReader;

use super::config::{ProfileDefaults, RawProfileDefaults};
use super::error::{AclError, ParsingError};
use super::permission::{PermissionSet, Profile};
use super::types as acl;
use super::xml::{self, QWrite};

/// Namespace declarations applied to the root `acl` element
pub const NAMESPACES: [(&str, &str); 2] = [
    ("", "DAV:"),
    ("C", "urn:ietf:params:xml:ns:caldav"),
];

/// Kind of ACE to generate
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum AceKind<'a> {
    Profile(Profile),
    Principal(&'a str, &'a PermissionSet),
}

/// In-memory ACL of a CalDAV resource.
///
/// No internal locking: an instance is meant to be owned by a single
/// request, callers sharing one must serialize access themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarAcl {
    defaults: ProfileDefaults,
    principals: IndexMap<String, PermissionSet>,
}

impl CalendarAcl {
    pub fn new(defaults: ProfileDefaults) -> Self {
        Self {
            defaults,
            principals: IndexMap::new(),
        }
    }

    /// Build from a loosely typed mapping, as found in server configuration
    pub fn from_config(config: RawProfileDefaults) -> Result<Self, AclError> {
        ProfileDefaults::try_from(config).map(Self::new)
    }

    pub fn from_toml(src: &str) -> Result<Self, AclError> {
        ProfileDefaults::from_toml(src).map(Self::new)
    }

    pub fn profile_defaults(&self) -> &ProfileDefaults {
        &self.defaults
    }

    /// Replace the three profile sets at once.
    /// On error the current defaults are left untouched.
    pub fn set_profile_defaults(&mut self, config: RawProfileDefaults) -> Result<(), AclError> {
        self.defaults = ProfileDefaults::try_from(config)?;
        Ok(())
    }

    pub fn replace_profile_defaults(&mut self, defaults: ProfileDefaults) {
        self.defaults = defaults;
    }

    pub fn namespaces(&self) -> &'static [(&'static str, &'static str)] {
        &NAMESPACES
    }

    /// Grant `perms` to the principal at `href`, replacing any previous grant.
    /// A replaced grant keeps its position in the output.
    pub fn add_principal<I, S>(&mut self, href: &str, perms: I) -> Result<(), AclError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let perms = PermissionSet::parse(perms)?;
        self.add_principal_set(href, perms)
    }

    /// Surrounding whitespace is not part of the href, as it would
    /// not survive a trip through the XML document.
    pub fn add_principal_set(&mut self, href: &str, perms: PermissionSet) -> Result<(), AclError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(AclError::InvalidArgument("empty principal href".into()));
        }

        if self.principals.insert(href.to_string(), perms).is_some() {
            tracing::trace!(href, "replaced principal grant");
        }
        Ok(())
    }

    /// Grant the principal one of the named sets of the profile
    /// configuration, eg. `share_read` or `share_rw`
    pub fn share(&mut self, href: &str, set: &str) -> Result<(), AclError> {
        let perms = self
            .defaults
            .named(set)
            .cloned()
            .ok_or_else(|| AclError::InvalidArgument(format!("unknown permission set {}", set)))?;
        self.add_principal_set(href, perms)
    }

    /// Returns whether a grant existed for `href`
    pub fn remove_principal(&mut self, href: &str) -> bool {
        self.principals.shift_remove(href.trim()).is_some()
    }

    pub fn grant(&self, href: &str) -> Option<&PermissionSet> {
        self.principals.get(href.trim())
    }

    /// Principal grants, in insertion order
    pub fn principals(&self) -> impl Iterator<Item = (&str, &PermissionSet)> {
        self.principals.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn generate_ace(&self, kind: AceKind<'_>) -> acl::Ace {
        let (principal, perms) = match kind {
            AceKind::Profile(profile) => {
                (acl::Principal::from(profile), self.defaults.get(profile))
            }
            AceKind::Principal(href, perms) => {
                (acl::Principal::Href(acl::Href(href.to_string())), perms)
            }
        };

        acl::Ace {
            principal,
            grant: acl::Grant(perms.iter().cloned().map(acl::Privilege).collect()),
        }
    }

    /// Profile ACEs first, in fixed order, then one ACE per principal grant
    pub fn to_document(&self) -> acl::Acl {
        let profiles = Profile::ALL
            .into_iter()
            .map(|p| self.generate_ace(AceKind::Profile(p)));
        let principals = self
            .principals()
            .map(|(href, perms)| self.generate_ace(AceKind::Principal(href, perms)));

        acl::Acl(profiles.chain(principals).collect())
    }

    /// Serialize to an UTF-8 XML 1.0 document
    pub fn to_xml(&self) -> Result<String, AclError> {
        let mut buffer = Vec::new();
        let q = quick_xml::writer::Writer::new_with_indent(&mut buffer, b' ', 4);
        let ns_to_apply = NAMESPACES
            .iter()
            .map(|(prefix, ns)| match prefix.is_empty() {
                true => ("xmlns".to_string(), ns.to_string()),
                false => (format!("xmlns:{}", prefix), ns.to_string()),
            })
            .collect();
        let mut writer = xml::Writer { q, ns_to_apply };

        let decl = BytesDecl::new("1.0", Some("utf-8"), None);
        writer.q.write_event(Event::Decl(decl))?;
        self.to_document().qwrite(&mut writer)?;

        let doc = String::from_utf8(buffer)?;
        tracing::debug!(
            principals = self.principals.len(),
            bytes = doc.len(),
            "serialized acl"
        );
        Ok(doc)
    }

    /// Build a new ACL from a document. The document must carry
    /// one ACE for each profile; when an ACE is repeated the last one wins.
    pub fn parse(src: &str) -> Result<Self, AclError> {
        let doc = decode(src)?;

        let mut owner = None;
        let mut authenticated = None;
        let mut unauthenticated = None;
        let mut principals = IndexMap::new();
        for (principal, perms) in entries(doc)? {
            match principal {
                Entry::Profile(Profile::Owner) => owner = Some(perms),
                Entry::Profile(Profile::Authenticated) => authenticated = Some(perms),
                Entry::Profile(Profile::Unauthenticated) => unauthenticated = Some(perms),
                Entry::Href(href) => {
                    principals.insert(href, perms);
                }
            }
        }

        let defaults = match (owner, authenticated, unauthenticated) {
            (Some(o), Some(a), Some(u)) => ProfileDefaults::new(o, a, u),
            _ => {
                tracing::debug!("acl document lacks a profile ace");
                return Err(AclError::MalformedDocument(ParsingError::MissingChild));
            }
        };

        Ok(Self {
            defaults,
            principals,
        })
    }

    /// Merge a document into this ACL: profiles present in the document
    /// replace the stored defaults, principal grants are inserted or replaced.
    /// Nothing is modified if the document is rejected.
    pub fn apply_xml(&mut self, src: &str) -> Result<(), AclError> {
        let doc = decode(src)?;
        for (principal, perms) in entries(doc)? {
            match principal {
                Entry::Profile(profile) => self.defaults.set(profile, perms),
                Entry::Href(href) => {
                    self.principals.insert(href, perms);
                }
            }
        }
        Ok(())
    }
}

fn decode(src: &str) -> Result<acl::Acl, AclError> {
    let mut rdr = xml::Reader::new(NsReader::from_reader(src.as_bytes()))?;
    let doc = rdr
        .document::<acl::Acl>()
        .inspect_err(|e| tracing::debug!(err=?e, "unable to decode acl document"))?;
    Ok(doc)
}

enum Entry {
    Profile(Profile),
    Href(String),
}

fn entries(doc: acl::Acl) -> Result<Vec<(Entry, PermissionSet)>, AclError> {
    doc.0
        .into_iter()
        .map(|ace| {
            let perms = ace.grant.0.into_iter().map(|p| p.0).collect::<PermissionSet>();
            let entry = match ace.principal {
                acl::Principal::Owner => Entry::Profile(Profile::Owner),
                acl::Principal::Authenticated => Entry::Profile(Profile::Authenticated),
                acl::Principal::Unauthenticated => Entry::Profile(Profile::Unauthenticated),
                acl::Principal::Href(acl::Href(href)) if href.is_empty() => {
                    return Err(AclError::MalformedDocument(ParsingError::InvalidValue))
                }
                acl::Principal::Href(acl::Href(href)) => Entry::Href(href),
            };
            Ok((entry, perms))
        })
        .collect()
}
