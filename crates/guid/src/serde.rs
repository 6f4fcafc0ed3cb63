use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::Guid;

/// Serializes as the signed integer form, which is what JSON consumers and
/// databases expect.
impl Serialize for Guid {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_i64().serialize(s)
    }
}

/// Deserializes from the integer form.
///
/// # Errors
///
/// Fails if the underlying deserializer fails or the value is negative (the
/// reserved bit is set).
impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(d)?;
        Guid::try_from(raw).map_err(de::Error::custom)
    }
}
