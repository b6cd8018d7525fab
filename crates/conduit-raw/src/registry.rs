//! Discriminator-keyed decoder registry.
//!
//! Polymorphic payloads carry a discriminator field (`type` for packets).
//! A [`DecoderRegistry`] maps each discriminator value to a decoder
//! function for one base type. Built-in variants are installed while the
//! registry is built, through [`with`](DecoderRegistry::with); plugins add
//! their own later through [`register`](DecoderRegistry::register).

use crate::{RawError, RawExt, TreeRaw};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Decodes a raw payload into `B`.
pub type Decoder<B> = Arc<dyn Fn(TreeRaw) -> Result<B, RawError> + Send + Sync>;

/// Registry of decoders for base type `B`.
///
/// # Example
///
/// ```
/// use conduit_raw::{DecoderRegistry, RawExt, TreeRaw};
/// use serde_json::json;
///
/// #[derive(Debug, PartialEq)]
/// enum Shape { Circle(f64), Square(f64) }
///
/// let shapes = DecoderRegistry::<Shape>::new("shape", "kind");
/// shapes.register("circle", |raw| Ok(Shape::Circle(raw.require("r")?))).unwrap();
/// shapes.register("square", |raw| Ok(Shape::Square(raw.require("side")?))).unwrap();
///
/// let raw = TreeRaw::from_value(json!({"kind": "circle", "r": 2.0})).unwrap();
/// assert_eq!(shapes.decode(raw).unwrap(), Shape::Circle(2.0));
/// ```
pub struct DecoderRegistry<B> {
    base: &'static str,
    discriminator: &'static str,
    decoders: RwLock<HashMap<String, Decoder<B>>>,
    fallback: Option<Decoder<B>>,
}

impl<B> DecoderRegistry<B> {
    /// Empty registry for `base`, reading the discriminator from the
    /// field called `discriminator`.
    #[must_use]
    pub fn new(base: &'static str, discriminator: &'static str) -> Self {
        Self {
            base,
            discriminator,
            decoders: RwLock::new(HashMap::new()),
            fallback: None,
        }
    }

    /// Installs a decoder for discriminators nobody registered.
    #[must_use]
    pub fn with_fallback<F>(mut self, decoder: F) -> Self
    where
        F: Fn(TreeRaw) -> Result<B, RawError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(decoder));
        self
    }

    /// Installs a built-in decoder while building the registry. A later
    /// `with` for the same discriminator replaces the earlier one.
    #[must_use]
    pub fn with<F>(mut self, discriminator: impl Into<String>, decoder: F) -> Self
    where
        F: Fn(TreeRaw) -> Result<B, RawError> + Send + Sync + 'static,
    {
        self.decoders
            .get_mut()
            .insert(discriminator.into(), Arc::new(decoder));
        self
    }

    /// Registers `decoder` for `discriminator`.
    ///
    /// # Errors
    ///
    /// [`RawError::DuplicateDecoder`] if one is already registered.
    pub fn register<F>(&self, discriminator: impl Into<String>, decoder: F) -> Result<(), RawError>
    where
        F: Fn(TreeRaw) -> Result<B, RawError> + Send + Sync + 'static,
    {
        let discriminator = discriminator.into();
        let mut decoders = self.decoders.write();
        if decoders.contains_key(&discriminator) {
            return Err(RawError::DuplicateDecoder {
                base: self.base,
                discriminator,
            });
        }
        decoders.insert(discriminator, Arc::new(decoder));
        Ok(())
    }

    /// Removes the decoder for `discriminator`. Returns whether one existed.
    pub fn unregister(&self, discriminator: &str) -> bool {
        self.decoders.write().remove(discriminator).is_some()
    }

    /// Whether `discriminator` has a registered decoder.
    #[must_use]
    pub fn contains(&self, discriminator: &str) -> bool {
        self.decoders.read().contains_key(discriminator)
    }

    /// Registered discriminators, sorted.
    #[must_use]
    pub fn discriminators(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.decoders.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Name of the base type.
    #[must_use]
    pub fn base(&self) -> &'static str {
        self.base
    }

    /// Decodes `raw` with the decoder registered for its discriminator.
    ///
    /// # Errors
    ///
    /// - The discriminator field is missing or not a string.
    /// - [`RawError::UnknownDiscriminator`] when nothing is registered and no
    ///   fallback is installed.
    /// - Whatever the selected decoder returns.
    pub fn decode(&self, raw: TreeRaw) -> Result<B, RawError> {
        let discriminator: String = raw.require(self.discriminator)?;
        // Clone the Arc so the lock is not held while decoding.
        let decoder = self.decoders.read().get(&discriminator).cloned();
        match decoder.or_else(|| self.fallback.clone()) {
            Some(decoder) => decoder(raw),
            None => Err(RawError::UnknownDiscriminator {
                base: self.base,
                discriminator,
            }),
        }
    }
}

impl<B> fmt::Debug for DecoderRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("base", &self.base)
            .field("discriminator", &self.discriminator)
            .field("registered", &self.discriminators())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
