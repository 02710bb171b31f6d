use super::permission::{Permission, Profile};

//RFC covered: RFC3744 (ACL core), grant-only subset, plus the
//privileges of RFC4791 section 6.1 through the CalDAV namespace.

/// 5.5. DAV:acl
///
/// <!ELEMENT acl (ace*) >
#[derive(Debug, PartialEq, Clone)]
pub struct Acl(pub Vec<Ace>);

/// 5.5. DAV:ace
///
/// <!ELEMENT ace ((principal | invert), (grant|deny), protected?, inherited?)>
///
/// Only the `principal` and `grant` forms are supported.
#[derive(Debug, PartialEq, Clone)]
pub struct Ace {
    pub principal: Principal,
    pub grant: Grant,
}

/// 5.5.1. ACE Principal
///
/// <!ELEMENT principal (href | all | authenticated | unauthenticated
///   | property | self)>
#[derive(Debug, PartialEq, Clone)]
pub enum Principal {
    /// <property><owner/></property>
    Owner,
    Authenticated,
    Unauthenticated,
    Href(Href),
}

impl From<Profile> for Principal {
    fn from(value: Profile) -> Self {
        match value {
            Profile::Owner => Self::Owner,
            Profile::Authenticated => Self::Authenticated,
            Profile::Unauthenticated => Self::Unauthenticated,
        }
    }
}

/// 5.5.2. ACE Grant
///
/// <!ELEMENT grant (privilege+)>
///
/// An empty grant is accepted and written as `<grant/>`.
#[derive(Debug, PartialEq, Clone)]
pub struct Grant(pub Vec<Privilege>);

/// <!ELEMENT privilege ANY>
///
/// The privilege is the name of the single child element.
#[derive(Debug, PartialEq, Clone)]
pub struct Privilege(pub Permission);

/// <!ELEMENT href (#PCDATA)>
#[derive(Debug, PartialEq, Clone)]
pub struct Href(pub String);
