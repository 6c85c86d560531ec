//! ServiceId - uuid of a timing feed

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Timing service identifier (the feed's uuid).
///
/// Service ids travel with every event, subscription handler and request
/// task; clones share one allocation.
///
/// # Examples
/// ```
/// use contracts::ServiceId;
///
/// let id: ServiceId = "wec-lemans".into();
/// assert_eq!(id, "wec-lemans");
/// assert_eq!(id.as_str(), "wec-lemans");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ServiceId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash of Arc<str> equals the hash of the str, so map lookups by &str work
impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.0.to_string()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({:?})", &*self.0)
    }
}

impl PartialEq<str> for ServiceId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ServiceId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
