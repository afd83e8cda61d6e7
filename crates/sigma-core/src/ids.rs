//! Strongly-typed identifiers for CloudSigma resources.
//!
//! The service treats resource identifiers as opaque strings. The wrappers in
//! this module keep server, drive and job identifiers apart at compile time
//! while preserving whatever text the service hands back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Macro to generate strongly-typed identifier wrapper types.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier string without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Creates a new random identifier (v4 UUID text).
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the identifier text.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Fails with a precondition error when the identifier is empty.
            ///
            /// # Errors
            ///
            /// Returns [`Error::Precondition`] for an empty identifier.
            pub fn require(&self) -> Result<&str> {
                if self.0.trim().is_empty() {
                    return Err(Error::Precondition(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                Ok(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let id = Self::new(s);
                id.require()?;
                Ok(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(ServerUuid, "Server instance identifier");
id_type!(DriveUuid, "Drive identifier");
id_type!(JobUuid, "Job identifier");
id_type!(VlanUuid, "VLAN identifier");
id_type!(IpUuid, "Static IP address identifier");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v4_is_unique_uuid() {
        let a = DriveUuid::new_v4();
        let b = DriveUuid::new_v4();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_opaque_ids_are_preserved() {
        let id = ServerUuid::from("u1");
        assert_eq!(id.as_str(), "u1");
        assert_eq!(id.to_string(), "u1");
    }

    #[test]
    fn test_require_rejects_empty() {
        let err = ServerUuid::new("").require().unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(err.to_string().contains("ServerUuid"));

        assert!(ServerUuid::new("   ").require().is_err());
        assert_eq!(ServerUuid::new("u1").require().unwrap(), "u1");
    }

    #[test]
    fn test_from_str_validates() {
        assert!("".parse::<JobUuid>().is_err());
        assert_eq!("job-1".parse::<JobUuid>().unwrap().as_str(), "job-1");
    }

    #[test]
    fn test_serde_transparent() {
        let id = DriveUuid::new("d-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"d-1\"");

        let back: DriveUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
