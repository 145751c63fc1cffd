use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(CustomerId, "Identifies the customer whose quota is charged.");
newtype_string!(FeatureId, "A monetized business feature gated by a quota.");
newtype_string!(UserId, "The end user acting on behalf of a customer.");
newtype_string!(ServiceName, "The service reporting or requesting usage.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_from_str() {
        let feature = FeatureId::from("create-invoice");
        assert_eq!(feature.as_str(), "create-invoice");
        assert_eq!(&*feature, "create-invoice");
    }

    #[test]
    fn newtype_from_string() {
        let customer = CustomerId::from("cust-42".to_string());
        assert_eq!(customer.to_string(), "cust-42");
    }

    #[test]
    fn newtype_serde_roundtrip() {
        let user = UserId::new("user-123");
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, "\"user-123\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn newtype_display() {
        let service = ServiceName::new("invoicing");
        assert_eq!(format!("{service}"), "invoicing");
    }
}
