use thiserror::Error;

/// Low level decoding failure, raised while walking the XML stream
#[derive(Debug)]
pub enum ParsingError {
    Recoverable,
    MissingChild,
    WrongToken,
    TagNotFound,
    InvalidValue,
    UnknownNamespace(String),
    Utf8Error(std::str::Utf8Error),
    QuickXml(quick_xml::Error),
    Eof,
}
impl std::fmt::Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::MissingChild => write!(f, "Missing child"),
            Self::WrongToken => write!(f, "Wrong token"),
            Self::TagNotFound => write!(f, "Tag not found"),
            Self::InvalidValue => write!(f, "Invalid value"),
            Self::UnknownNamespace(name) => write!(f, "Element {} has an unknown namespace", name),
            Self::Utf8Error(_) => write!(f, "Utf8 Error"),
            Self::QuickXml(_) => write!(f, "Quick XML error"),
            Self::Eof => write!(f, "Found EOF while expecting data"),
        }
    }
}
impl std::error::Error for ParsingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Utf8Error(e) => Some(e),
            Self::QuickXml(e) => Some(e),
            _ => None,
        }
    }
}
impl From<quick_xml::Error> for ParsingError {
    fn from(value: quick_xml::Error) -> Self {
        Self::QuickXml(value)
    }
}
impl From<std::str::Utf8Error> for ParsingError {
    fn from(value: std::str::Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

/// Errors returned to the caller of the ACL API
#[derive(Debug, Error)]
pub enum AclError {
    #[error("invalid profile configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed ACL document: {0}")]
    MalformedDocument(#[source] ParsingError),
    #[error("privilege {0} is not part of a known namespace")]
    UnknownPrivilege(String),
    #[error("unable to serialize ACL: {0}")]
    Serialization(#[from] quick_xml::Error),
    #[error("serialized ACL is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl From<ParsingError> for AclError {
    fn from(value: ParsingError) -> Self {
        match value {
            ParsingError::UnknownNamespace(name) => Self::UnknownPrivilege(name),
            other => Self::MalformedDocument(other),
        }
    }
}
