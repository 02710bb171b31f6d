// utils
pub mod error;
pub mod xml;

// model
pub mod permission;
pub mod config;

// wire format
pub mod types;
pub mod encoder;
pub mod decoder;

// entity
pub mod acl;

pub use acl::CalendarAcl;
pub use config::ProfileDefaults;
pub use error::AclError;
pub use permission::{Permission, PermissionSet, Profile};
