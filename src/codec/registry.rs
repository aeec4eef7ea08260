//! Schema registry: maps `(schemaId, schemaVersion)` to a decode function
//! (spec §4.1 "serialiser registry", §9 "register every known pair
//! explicitly during startup — avoid reflection").
//!
//! The registry is generic over the decoded output type so it can back both
//! the top-level IQ dispatch table (`SchemaRegistry<AnyIq>`, spec §4.4) and
//! the polymorphic inner-payload dispatch used by `ObjectDescriptor`'s
//! message body and `PushTransientIQ`'s payload (spec §4.1 "Polymorphism",
//! §9 "Polymorphic payloads").

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::primitives::Decoder;
use crate::error::{ConvError, ConvResult};

/// `(schemaId, schemaVersion)`, the registry's lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub schema_id: Uuid,
    pub schema_version: i32,
}

impl SchemaKey {
    pub fn new(schema_id: Uuid, schema_version: i32) -> Self {
        Self {
            schema_id,
            schema_version,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, v{})", self.schema_id, self.schema_version)
    }
}

type DecodeFn<T> = Arc<dyn Fn(&mut Decoder) -> ConvResult<T> + Send + Sync>;

/// A registry of decoders keyed by `SchemaKey`, producing a value of the
/// shared output type `T` (typically a closed enum of everything that can
/// arrive at this dispatch point).
pub struct SchemaRegistry<T> {
    decoders: HashMap<SchemaKey, DecodeFn<T>>,
}

impl<T> Default for SchemaRegistry<T> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }
}

impl<T> SchemaRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decoder for `key`. Panics on a duplicate key: this is a
    /// startup-time programmer error (spec §9 "register every known pair
    /// explicitly"), not a runtime condition.
    pub fn register<F>(&mut self, key: SchemaKey, decode: F)
    where
        F: Fn(&mut Decoder) -> ConvResult<T> + Send + Sync + 'static,
    {
        let previous = self.decoders.insert(key, Arc::new(decode));
        assert!(
            previous.is_none(),
            "duplicate schema registration for {key}"
        );
    }

    pub fn is_registered(&self, key: SchemaKey) -> bool {
        self.decoders.contains_key(&key)
    }

    /// Looks up and runs the decoder for `key`. A missing key is reported
    /// via `ConvError::UnknownSchema` so the caller can log-and-drop per
    /// spec §4.1/§4.4 rather than treat it as fatal.
    pub fn decode(&self, key: SchemaKey, decoder: &mut Decoder) -> ConvResult<T> {
        match self.decoders.get(&key) {
            Some(f) => f(decoder),
            None => Err(ConvError::UnknownSchema {
                schema_id: key.schema_id,
                schema_version: key.schema_version,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Dummy {
        A(i32),
    }

    #[test]
    fn unregistered_schema_is_reported_not_panicking() {
        let registry: SchemaRegistry<Dummy> = SchemaRegistry::new();
        let mut dec = Decoder::new(&[]);
        let key = SchemaKey::new(Uuid::nil(), 1);
        assert!(matches!(
            registry.decode(key, &mut dec),
            Err(ConvError::UnknownSchema { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "duplicate schema registration")]
    fn duplicate_registration_panics_at_startup() {
        let mut registry: SchemaRegistry<Dummy> = SchemaRegistry::new();
        let key = SchemaKey::new(Uuid::nil(), 1);
        registry.register(key, |d| Ok(Dummy::A(d.read_int()?)));
        registry.register(key, |d| Ok(Dummy::A(d.read_int()?)));
    }

    #[test]
    fn registered_schema_decodes() {
        let mut registry: SchemaRegistry<Dummy> = SchemaRegistry::new();
        let key = SchemaKey::new(Uuid::nil(), 1);
        registry.register(key, |d| Ok(Dummy::A(d.read_int()?)));

        let mut enc = super::super::primitives::Encoder::new();
        enc.write_int(42);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(registry.decode(key, &mut dec).unwrap(), Dummy::A(42));
    }
}
