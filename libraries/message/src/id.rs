use std::{borrow::Borrow, convert::Infallible, str::FromStr};

use serde::{Deserialize, Serialize};

/// Name of a component port, e.g. `in`, `out` or `out[2]` for one element of
/// an array port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(String);

impl PortId {
    /// The id of element `index` of the array port `base`.
    pub fn indexed(base: &str, index: usize) -> Self {
        Self(format!("{base}[{index}]"))
    }

    /// Name of the declared port this id belongs to.
    ///
    /// Strips the `[index]` suffix of array port elements.
    pub fn base(&self) -> &str {
        match self.0.split_once('[') {
            Some((base, rest)) if rest.ends_with(']') => base,
            _ => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PortId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<String> for PortId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PortId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<PortId> for String {
    fn from(id: PortId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::ops::Deref for PortId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PortId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_ids_keep_their_base() {
        let id = PortId::indexed("out", 2);
        assert_eq!(id.as_str(), "out[2]");
        assert_eq!(id.base(), "out");
        assert_eq!(PortId::from("err").base(), "err");
    }
}
