use std::io::{BufRead, Write};

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use super::error::ParsingError;

// Constants
pub const DAV_URN: &[u8] = b"DAV:";
pub const CAL_URN: &[u8] = b"urn:ietf:params:xml:ns:caldav";

// I/O bounds
pub trait IWrite: Write {}
impl<T: Write> IWrite for T {}
pub trait IRead: BufRead {}
impl<T: BufRead> IRead for T {}

// Serialization/Deserialization traits
pub trait QWrite {
    fn qwrite(&self, xml: &mut Writer<impl IWrite>) -> Result<(), quick_xml::Error>;
}
pub trait QRead<T> {
    fn qread(xml: &mut Reader<impl IRead>) -> Result<T, ParsingError>;
}

// The representation of an XML node in Rust
pub trait Node<T>: QRead<T> + QWrite + std::fmt::Debug + PartialEq + Clone {}
impl<T: QRead<T> + QWrite + std::fmt::Debug + PartialEq + Clone> Node<T> for T {}

// ---------------

/// Transform a Rust object into an XML stream of characters
pub struct Writer<T: IWrite> {
    pub q: quick_xml::writer::Writer<T>,
    pub ns_to_apply: Vec<(String, String)>,
}
impl<T: IWrite> Writer<T> {
    /// `DAV:` is bound as the default namespace, elements are unprefixed
    pub fn create_dav_element(&mut self, name: &str) -> BytesStart<'static> {
        self.create_element(name.to_string())
    }
    pub fn create_cal_element(&mut self, name: &str) -> BytesStart<'static> {
        self.create_element(format!("C:{}", name))
    }

    fn create_element(&mut self, qname: String) -> BytesStart<'static> {
        let mut start = BytesStart::new(qname);
        if !self.ns_to_apply.is_empty() {
            start.extend_attributes(
                self.ns_to_apply
                    .iter()
                    .map(|(k, n)| (k.as_str(), n.as_str())),
            );
            self.ns_to_apply.clear()
        }
        start
    }
}

/// Transform an XML stream of characters into a Rust object
pub struct Reader<T: IRead> {
    pub rdr: NsReader<T>,
    cur: Event<'static>,
    parents: Vec<Event<'static>>,
    buf: Vec<u8>,
}
impl<T: IRead> Reader<T> {
    pub fn new(mut rdr: NsReader<T>) -> Result<Self, ParsingError> {
        let mut buf: Vec<u8> = vec![];
        let cur = rdr.read_event_into(&mut buf)?.into_owned();
        let parents = vec![];
        buf.clear();
        Ok(Self {
            cur,
            parents,
            rdr,
            buf,
        })
    }

    /// read one more tag
    /// do not expose it publicly
    fn next(&mut self) -> Result<Event<'static>, ParsingError> {
        let evt = self.rdr.read_event_into(&mut self.buf)?.into_owned();
        self.buf.clear();
        Ok(std::mem::replace(&mut self.cur, evt))
    }

    /// skip a node at current level
    ///
    /// Events are consumed one by one, instead of `read_to_end_into`,
    /// so that namespace scopes of the skipped node are properly closed.
    pub fn skip(&mut self) -> Result<Event<'static>, ParsingError> {
        match &self.cur {
            Event::Start(_) => {
                let mut depth = 0usize;
                loop {
                    match self.next()? {
                        Event::Start(_) => depth += 1,
                        evt @ Event::End(_) if depth == 1 => return Ok(evt),
                        Event::End(_) => depth -= 1,
                        Event::Eof => return Err(ParsingError::Eof),
                        _ => (),
                    }
                }
            }
            Event::End(_) => Err(ParsingError::WrongToken),
            Event::Eof => Err(ParsingError::Eof),
            _ => self.next(),
        }
    }

    /// check if this is the desired tag
    fn is_tag(&self, ns: &[u8], key: &str) -> bool {
        match self.peek_element() {
            Some((Some(extr_ns), local)) => extr_ns == ns && local == key,
            _ => false,
        }
    }

    /// Namespace and local name of the current element, if any.
    /// An unbound namespace is reported as `None`.
    pub fn peek_element(&self) -> Option<(Option<Vec<u8>>, String)> {
        let qname = match self.peek() {
            Event::Start(bs) | Event::Empty(bs) => bs.name(),
            Event::End(be) => be.name(),
            _ => return None,
        };

        let (extr_ns, local) = self.rdr.resolve_element(qname);
        let local = String::from_utf8_lossy(local.into_inner()).into_owned();
        let ns = match extr_ns {
            ResolveResult::Bound(v) => Some(v.into_inner().to_vec()),
            _ => None,
        };
        Some((ns, local))
    }

    pub fn parent_has_child(&self) -> bool {
        matches!(self.parents.last(), Some(Event::Start(_)) | None)
    }

    fn ensure_parent_has_child(&self) -> Result<(), ParsingError> {
        match self.parent_has_child() {
            true => Ok(()),
            false => Err(ParsingError::Recoverable),
        }
    }

    pub fn peek(&self) -> &Event<'static> {
        &self.cur
    }

    pub fn tag_string(&mut self) -> Result<String, ParsingError> {
        self.ensure_parent_has_child()?;

        let mut acc = String::new();
        loop {
            match self.peek() {
                Event::CData(unescaped) => {
                    acc.push_str(std::str::from_utf8(unescaped.as_ref())?);
                    self.next()?
                }
                Event::Text(escaped) => {
                    acc.push_str(escaped.unescape()?.as_ref());
                    self.next()?
                }
                Event::End(_) | Event::Start(_) | Event::Empty(_) => return Ok(acc),
                Event::Eof => return Err(ParsingError::Eof),
                _ => self.next()?,
            };
        }
    }

    /// Skip the prolog (declaration, comments, whitespace), require the
    /// root element of the document to be `N`, and nothing but comments
    /// or whitespace after it.
    pub fn document<N: QRead<N>>(&mut self) -> Result<N, ParsingError> {
        loop {
            match self.peek() {
                Event::Start(_) | Event::Empty(_) => break,
                Event::Decl(_) | Event::DocType(_) => {
                    self.next()?;
                }
                _ => self.skip_misc()?,
            }
        }

        let root = match N::qread(self) {
            Err(ParsingError::Recoverable) => return Err(ParsingError::TagNotFound),
            otherwise => otherwise?,
        };

        loop {
            match self.peek() {
                Event::Eof => return Ok(root),
                _ => self.skip_misc()?,
            }
        }
    }

    /// Consume a comment, a processing instruction or blank text,
    /// anything else is an error
    fn skip_misc(&mut self) -> Result<(), ParsingError> {
        match self.peek() {
            Event::Comment(_) | Event::PI(_) => (),
            Event::Text(txt) if txt.unescape()?.trim().is_empty() => (),
            Event::Eof => return Err(ParsingError::Eof),
            _ => return Err(ParsingError::WrongToken),
        };
        self.next()?;
        Ok(())
    }

    pub fn find<N: QRead<N>>(&mut self) -> Result<N, ParsingError> {
        self.ensure_parent_has_child()?;

        loop {
            // Try parse
            match N::qread(self) {
                Err(ParsingError::Recoverable) => (),
                otherwise => return otherwise,
            }

            // If recovered, skip the element
            self.skip()?;
        }
    }

    pub fn maybe_find<N: QRead<N>>(&mut self) -> Result<Option<N>, ParsingError> {
        // We can't find anything inside a self-closed tag
        if !self.parent_has_child() {
            return Ok(None);
        }

        loop {
            // Try parse
            match N::qread(self) {
                Err(ParsingError::Recoverable) => (),
                otherwise => return otherwise.map(Some),
            }

            // Skip or stop
            match self.peek() {
                Event::End(_) => return Ok(None),
                _ => self.skip()?,
            };
        }
    }

    pub fn collect<N: QRead<N>>(&mut self) -> Result<Vec<N>, ParsingError> {
        let mut acc = Vec::new();
        if !self.parent_has_child() {
            return Ok(acc);
        }

        loop {
            match N::qread(self) {
                Err(ParsingError::Recoverable) => match self.peek() {
                    Event::End(_) => return Ok(acc),
                    _ => {
                        self.skip()?;
                    }
                },
                Ok(v) => acc.push(v),
                Err(e) => return Err(e),
            }
        }
    }

    pub fn open(&mut self, ns: &[u8], key: &str) -> Result<Event<'static>, ParsingError> {
        let evt = match self.peek() {
            // An empty node has no closing event: stay on it,
            // close() will consume it.
            Event::Empty(_) if self.is_tag(ns, key) => self.cur.clone(),
            Event::Start(_) if self.is_tag(ns, key) => self.next()?,
            _ => return Err(ParsingError::Recoverable),
        };

        self.parents.push(evt.clone());
        Ok(evt)
    }

    /// Open whatever element comes first, returning its namespace and local name
    pub fn open_any(&mut self) -> Result<(Option<Vec<u8>>, String), ParsingError> {
        let name = self.peek_element().ok_or(ParsingError::Recoverable)?;
        let evt = match self.peek() {
            Event::Empty(_) => self.cur.clone(),
            Event::Start(_) => self.next()?,
            _ => return Err(ParsingError::Recoverable),
        };

        self.parents.push(evt);
        Ok(name)
    }

    pub fn open_start(&mut self, ns: &[u8], key: &str) -> Result<Event<'static>, ParsingError> {
        let evt = match self.peek() {
            Event::Start(_) if self.is_tag(ns, key) => self.next()?,
            _ => return Err(ParsingError::Recoverable),
        };

        self.parents.push(evt.clone());
        Ok(evt)
    }

    pub fn maybe_open(
        &mut self,
        ns: &[u8],
        key: &str,
    ) -> Result<Option<Event<'static>>, ParsingError> {
        match self.open(ns, key) {
            Ok(v) => Ok(Some(v)),
            Err(ParsingError::Recoverable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn maybe_open_start(
        &mut self,
        ns: &[u8],
        key: &str,
    ) -> Result<Option<Event<'static>>, ParsingError> {
        match self.open_start(ns, key) {
            Ok(v) => Ok(Some(v)),
            Err(ParsingError::Recoverable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Move forward until the next element or closing tag of the current level
    pub fn skip_text(&mut self) -> Result<(), ParsingError> {
        loop {
            match self.peek() {
                Event::Start(_) | Event::Empty(_) | Event::End(_) => return Ok(()),
                Event::Eof => return Err(ParsingError::Eof),
                _ => {
                    self.next()?;
                }
            }
        }
    }

    // find stop tag
    pub fn close(&mut self) -> Result<Event<'static>, ParsingError> {
        // Handle the empty case
        if !self.parent_has_child() {
            self.parents.pop();
            return self.next();
        }

        // Handle the start/end case
        loop {
            match self.peek() {
                Event::End(_) => {
                    self.parents.pop();
                    return self.next();
                }
                _ => self.skip()?,
            };
        }
    }
}
