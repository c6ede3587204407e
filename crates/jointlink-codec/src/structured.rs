use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Conversion to and from a generic field map.
///
/// The structured form is a JSON object keyed by field name in declared
/// order: scalars stay scalars, nested structs become nested objects and
/// fixed-size arrays become arrays. It is what command-line and file based
/// configuration fills in without knowing the wire layout.
pub trait StructuredConvertible: Serialize + DeserializeOwned {
    /// Structured form of this value.
    fn to_structured(&self) -> Value {
        // Integer-only structs always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Build a value from its structured form.
    ///
    /// Every field must be present and in range; unknown fields are rejected.
    fn from_structured(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
