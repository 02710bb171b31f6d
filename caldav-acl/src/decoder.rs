use super::error::ParsingError;
use super::permission::{Permission, CAL_PREFIX};
use super::types::*;
use super::xml::{IRead, QRead, Reader, CAL_URN, DAV_URN};

impl QRead<Acl> for Acl {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "acl")?;
        let aces = xml.collect()?;
        xml.close()?;
        tracing::trace!(count = aces.len(), "decoded acl");
        Ok(Acl(aces))
    }
}

impl QRead<Ace> for Ace {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "ace")?;
        let principal = xml
            .maybe_find::<Principal>()?
            .ok_or(ParsingError::MissingChild)?;
        let grant = xml.maybe_find::<Grant>()?.ok_or(ParsingError::MissingChild)?;
        xml.close()?;
        Ok(Ace { principal, grant })
    }
}

impl QRead<Principal> for Principal {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "principal")?;
        let principal = xml
            .maybe_find::<PrincipalForm>()?
            .ok_or(ParsingError::MissingChild)?;
        xml.close()?;
        Ok(principal.0)
    }
}

/// The single child of `principal`, kept apart so that
/// unsupported forms (all, self, other properties) can be skipped
#[derive(Debug, PartialEq, Clone)]
struct PrincipalForm(Principal);

impl QRead<PrincipalForm> for PrincipalForm {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        if xml.maybe_open(DAV_URN, "authenticated")?.is_some() {
            xml.close()?;
            return Ok(Self(Principal::Authenticated));
        }
        if xml.maybe_open(DAV_URN, "unauthenticated")?.is_some() {
            xml.close()?;
            return Ok(Self(Principal::Unauthenticated));
        }
        if xml.maybe_open_start(DAV_URN, "property")?.is_some() {
            let owner = xml.maybe_find::<Owner>()?;
            xml.close()?;
            return match owner {
                Some(_) => Ok(Self(Principal::Owner)),
                None => {
                    tracing::debug!("property principal other than owner is not supported");
                    Err(ParsingError::MissingChild)
                }
            };
        }

        Href::qread(xml).map(|href| Self(Principal::Href(href)))
    }
}

#[derive(Debug, PartialEq, Clone)]
struct Owner;

impl QRead<Owner> for Owner {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "owner")?;
        xml.close()?;
        Ok(Owner)
    }
}

impl QRead<Grant> for Grant {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "grant")?;
        let privileges = xml.collect()?;
        xml.close()?;
        Ok(Grant(privileges))
    }
}

impl QRead<Privilege> for Privilege {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "privilege")?;
        if !xml.parent_has_child() {
            return Err(ParsingError::InvalidValue);
        }
        xml.skip_text()?;
        let (ns, local) = match xml.open_any() {
            Err(ParsingError::Recoverable) => return Err(ParsingError::InvalidValue),
            otherwise => otherwise?,
        };
        xml.close()?;
        xml.close()?;

        let token = match ns.as_deref() {
            Some(DAV_URN) => local,
            Some(CAL_URN) => format!("{}{}", CAL_PREFIX, local),
            _ => return Err(ParsingError::UnknownNamespace(local)),
        };
        let permission = Permission::new(token).map_err(|_| ParsingError::InvalidValue)?;
        Ok(Privilege(permission))
    }
}

impl QRead<Href> for Href {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<Self, ParsingError> {
        xml.open(DAV_URN, "href")?;
        let url = match xml.parent_has_child() {
            true => xml.tag_string()?,
            false => String::new(),
        };
        xml.close()?;
        Ok(Href(url.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::reader::NsReader;

    fn deserialize<T: crate::xml::Node<T>>(src: &str) -> Result<T, ParsingError> {
        let mut rdr = Reader::new(NsReader::from_reader(src.as_bytes()))?;
        rdr.find::<T>()
    }

    fn privilege(name: &str) -> Privilege {
        Privilege(Permission::new(name).unwrap())
    }

    #[test]
    fn rfc3744_ace_with_prefixed_namespace() {
        let src = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:acl xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:ace>
        <D:principal>
            <D:href>http://www.example.com/acl/groups/maintainers</D:href>
        </D:principal>
        <D:grant>
            <D:privilege><D:write/></D:privilege>
            <D:privilege><C:read-free-busy/></D:privilege>
        </D:grant>
    </D:ace>
    <D:ace>
        <D:principal><D:property><D:owner/></D:property></D:principal>
        <D:grant><D:privilege><D:all/></D:privilege></D:grant>
    </D:ace>
</D:acl>"#;

        let got = deserialize::<Acl>(src).unwrap();
        assert_eq!(
            got,
            Acl(vec![
                Ace {
                    principal: Principal::Href(Href(
                        "http://www.example.com/acl/groups/maintainers".into()
                    )),
                    grant: Grant(vec![privilege("write"), privilege("C:read-free-busy")]),
                },
                Ace {
                    principal: Principal::Owner,
                    grant: Grant(vec![privilege("all")]),
                },
            ])
        );
    }

    #[test]
    fn unknown_siblings_are_skipped() {
        let src = r#"<acl xmlns="DAV:" xmlns:X="http://example.com/ns">
    <X:comment>ignored</X:comment>
    <X:extension xmlns="http://example.com/other"><ace/></X:extension>
    <ace>
        <X:note/>
        <principal><unauthenticated/></principal>
        <grant/>
        <protected/>
    </ace>
</acl>"#;

        let got = deserialize::<Acl>(src).unwrap();
        assert_eq!(
            got,
            Acl(vec![Ace {
                principal: Principal::Unauthenticated,
                grant: Grant(vec![]),
            }])
        );
    }

    #[test]
    fn unsupported_principal_form() {
        let src = r#"<acl xmlns="DAV:"><ace>
    <principal><all/></principal>
    <grant><privilege><read/></privilege></grant>
</ace></acl>"#;

        assert!(matches!(
            deserialize::<Acl>(src),
            Err(ParsingError::MissingChild)
        ));
    }

    #[test]
    fn property_other_than_owner() {
        let src = r#"<acl xmlns="DAV:"><ace>
    <principal><property><group/></property></principal>
    <grant><privilege><read/></privilege></grant>
</ace></acl>"#;

        assert!(matches!(
            deserialize::<Acl>(src),
            Err(ParsingError::MissingChild)
        ));
    }

    #[test]
    fn deny_ace_is_not_a_grant() {
        let src = r#"<acl xmlns="DAV:"><ace>
    <principal><authenticated/></principal>
    <deny><privilege><write/></privilege></deny>
</ace></acl>"#;

        assert!(matches!(
            deserialize::<Acl>(src),
            Err(ParsingError::MissingChild)
        ));
    }

    #[test]
    fn privilege_from_foreign_namespace() {
        let src = r#"<acl xmlns="DAV:" xmlns:X="http://example.com/ns"><ace>
    <principal><authenticated/></principal>
    <grant><privilege><X:custom/></privilege></grant>
</ace></acl>"#;

        match deserialize::<Acl>(src) {
            Err(ParsingError::UnknownNamespace(name)) => assert_eq!(name, "custom"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn self_closed_privilege() {
        let src = r#"<acl xmlns="DAV:"><ace>
    <principal><authenticated/></principal>
    <grant><privilege/></grant>
</ace></acl>"#;

        assert!(matches!(
            deserialize::<Acl>(src),
            Err(ParsingError::InvalidValue)
        ));
    }

    #[test]
    fn empty_privilege() {
        let src = r#"<acl xmlns="DAV:"><ace>
    <principal><authenticated/></principal>
    <grant><privilege></privilege></grant>
</ace></acl>"#;

        assert!(matches!(
            deserialize::<Acl>(src),
            Err(ParsingError::InvalidValue)
        ));
    }
}
