use quick_xml::events::{BytesText, Event};
use quick_xml::Error as QError;

use super::types::*;
use super::xml::{IWrite, QWrite, Writer};

impl QWrite for Acl {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("acl");
        if self.0.is_empty() {
            return xml.q.write_event(Event::Empty(start));
        }

        let end = start.to_end().into_owned();
        xml.q.write_event(Event::Start(start.clone()))?;
        for ace in self.0.iter() {
            ace.qwrite(xml)?;
        }
        xml.q.write_event(Event::End(end))
    }
}

impl QWrite for Ace {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("ace");
        let end = start.to_end().into_owned();

        xml.q.write_event(Event::Start(start.clone()))?;
        self.principal.qwrite(xml)?;
        self.grant.qwrite(xml)?;
        xml.q.write_event(Event::End(end))
    }
}

impl QWrite for Principal {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("principal");
        let end = start.to_end().into_owned();
        xml.q.write_event(Event::Start(start.clone()))?;

        match self {
            Self::Owner => {
                let property = xml.create_dav_element("property");
                let property_end = property.to_end().into_owned();
                xml.q.write_event(Event::Start(property.clone()))?;
                let owner = xml.create_dav_element("owner");
                xml.q.write_event(Event::Empty(owner))?;
                xml.q.write_event(Event::End(property_end))?;
            }
            Self::Authenticated => {
                let tag = xml.create_dav_element("authenticated");
                xml.q.write_event(Event::Empty(tag))?;
            }
            Self::Unauthenticated => {
                let tag = xml.create_dav_element("unauthenticated");
                xml.q.write_event(Event::Empty(tag))?;
            }
            Self::Href(href) => href.qwrite(xml)?,
        };

        xml.q.write_event(Event::End(end))
    }
}

impl QWrite for Grant {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("grant");
        if self.0.is_empty() {
            return xml.q.write_event(Event::Empty(start));
        }

        let end = start.to_end().into_owned();
        xml.q.write_event(Event::Start(start.clone()))?;
        for privilege in self.0.iter() {
            privilege.qwrite(xml)?;
        }
        xml.q.write_event(Event::End(end))
    }
}

impl QWrite for Privilege {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("privilege");
        let end = start.to_end().into_owned();
        xml.q.write_event(Event::Start(start.clone()))?;

        let name = match self.0.is_caldav() {
            true => xml.create_cal_element(self.0.local_name()),
            false => xml.create_dav_element(self.0.local_name()),
        };
        xml.q.write_event(Event::Empty(name))?;

        xml.q.write_event(Event::End(end))
    }
}

impl QWrite for Href {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), QError> {
        let start = xml.create_dav_element("href");
        let end = start.to_end().into_owned();

        xml.q.write_event(Event::Start(start.clone()))?;
        xml.q.write_event(Event::Text(BytesText::new(&self.0)))?;
        xml.q.write_event(Event::End(end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;

    fn serialize(elem: &impl QWrite) -> String {
        let mut buffer = Vec::new();
        let q = quick_xml::writer::Writer::new_with_indent(&mut buffer, b' ', 4);
        let ns_to_apply = vec![
            ("xmlns".into(), "DAV:".into()),
            ("xmlns:C".into(), "urn:ietf:params:xml:ns:caldav".into()),
        ];
        let mut writer = Writer { q, ns_to_apply };

        elem.qwrite(&mut writer).expect("xml serialization");
        String::from_utf8(buffer).unwrap()
    }

    fn privilege(name: &str) -> Privilege {
        Privilege(Permission::new(name).unwrap())
    }

    #[test]
    fn owner_ace() {
        let got = serialize(&Ace {
            principal: Principal::Owner,
            grant: Grant(vec![privilege("read-acl")]),
        });

        let expected = r#"<ace xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <principal>
        <property>
            <owner/>
        </property>
    </principal>
    <grant>
        <privilege>
            <read-acl/>
        </privilege>
    </grant>
</ace>"#;

        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }

    #[test]
    fn href_ace_with_caldav_privilege() {
        let got = serialize(&Ace {
            principal: Principal::Href(Href("/principals/a&b/".into())),
            grant: Grant(vec![privilege("read"), privilege("C:read-free-busy")]),
        });

        let expected = r#"<ace xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <principal>
        <href>/principals/a&amp;b/</href>
    </principal>
    <grant>
        <privilege>
            <read/>
        </privilege>
        <privilege>
            <C:read-free-busy/>
        </privilege>
    </grant>
</ace>"#;

        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }

    #[test]
    fn unauthenticated_without_privileges() {
        let got = serialize(&Acl(vec![Ace {
            principal: Principal::Unauthenticated,
            grant: Grant(vec![]),
        }]));

        let expected = r#"<acl xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <ace>
        <principal>
            <unauthenticated/>
        </principal>
        <grant/>
    </ace>
</acl>"#;

        assert_eq!(&got, expected, "\n---GOT---\n{got}\n---EXP---\n{expected}\n");
    }
}
