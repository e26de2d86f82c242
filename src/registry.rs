//! The table of available transforms and the choice of a conversion path
//!
//! A [`Registry`] is assembled once with a [`RegistryBuilder`] and is read-only
//! afterwards, so it can be shared between threads without locking. Every
//! registered encoding contributes two entries, `name -> canonical` (its decoder)
//! and `canonical -> name` (its encoder). Direct entries between two non-canonical
//! encodings can be added on top and always win over bridging through the
//! canonical form.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};

use tracing::{debug, trace};

use crate::charsets::{self, UTF8};
use crate::transform::{Codec, TransformFactory};
use crate::{Error, Result, UnknownSide};

static GLOBAL: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builtin().expect("built-in encodings are registered exactly once")
});

/// One registered transform together with the encodings on either side of it
#[derive(Debug, Clone)]
pub struct Stage {
    from: Arc<str>,
    to: Arc<str>,
    factory: TransformFactory,
}

impl Stage {
    /// Encoding of the bytes this stage consumes
    pub fn from_encoding(&self) -> &str {
        &self.from
    }

    /// Encoding of the bytes this stage produces
    pub fn to_encoding(&self) -> &str {
        &self.to
    }

    pub(crate) fn factory(&self) -> &TransformFactory {
        &self.factory
    }
}

/// The route a conversion takes
#[derive(Debug, Clone)]
pub enum ConversionPath {
    /// Source and target are the same encoding; bytes pass through untouched
    Identity,
    /// A single registered transform
    Direct(Stage),
    /// Decode to the canonical form, then encode from it
    Bridged {
        /// `from -> canonical`
        decode: Stage,
        /// `canonical -> to`
        encode: Stage,
    },
}

impl ConversionPath {
    /// Whether no transform is applied
    pub fn is_identity(&self) -> bool {
        matches!(self, ConversionPath::Identity)
    }

    /// Whether a single registered transform is applied
    pub fn is_direct(&self) -> bool {
        matches!(self, ConversionPath::Direct(_))
    }

    /// Whether the conversion goes through the canonical form
    pub fn is_bridged(&self) -> bool {
        matches!(self, ConversionPath::Bridged { .. })
    }
}

/// Immutable mapping from `(from, to)` encoding pairs to transforms
#[derive(Debug, Clone)]
pub struct Registry {
    canonical: Arc<str>,
    routes: HashMap<Arc<str>, HashMap<Arc<str>, Stage>>,
}

impl Registry {
    /// Start an empty registry bridged through UTF-8
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new(UTF8)
    }

    /// Registry with every built-in encoding
    pub fn builtin() -> Result<Registry> {
        let mut builder = Registry::builder();
        charsets::register_builtin(&mut builder)?;
        Ok(builder.build())
    }

    /// The process-wide registry of built-in encodings, built on first use
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Name of the hub encoding
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Every encoding that takes part in at least one registered transform,
    /// plus the canonical form
    pub fn encodings(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::from([&*self.canonical]);
        for (from, targets) in &self.routes {
            names.insert(&**from);
            names.extend(targets.keys().map(|to| &**to));
        }
        names
    }

    /// Transform registered for exactly `(from, to)`
    pub fn lookup_direct(&self, from: &str, to: &str) -> Option<&Stage> {
        self.routes.get(from)?.get(to)
    }

    /// Decoder of `from` and encoder of `to`, if both are registered
    pub fn lookup_bridge(&self, from: &str, to: &str) -> Option<(&Stage, &Stage)> {
        let decode = self.lookup_direct(from, &self.canonical)?;
        let encode = self.lookup_direct(&self.canonical, to)?;
        Some((decode, encode))
    }

    /// Pick the conversion path for `(from, to)`.
    ///
    /// Identity comes first, then a direct transform, then the bridge through the
    /// canonical form.
    pub fn resolve(&self, from: &str, to: &str) -> Result<ConversionPath> {
        if from == to && self.is_known(from) {
            trace!(from, to, "identity conversion");
            return Ok(ConversionPath::Identity);
        }
        if let Some(stage) = self.lookup_direct(from, to) {
            trace!(from, to, "direct conversion");
            return Ok(ConversionPath::Direct(stage.clone()));
        }
        if let Some((decode, encode)) = self.lookup_bridge(from, to) {
            trace!(from, to, canonical = %self.canonical, "bridged conversion");
            return Ok(ConversionPath::Bridged {
                decode: decode.clone(),
                encode: encode.clone(),
            });
        }

        let unknown = match (self.decodes(from), self.encodes(to)) {
            (false, false) => UnknownSide::Both,
            (false, true) => UnknownSide::From,
            (true, _) => UnknownSide::To,
        };
        debug!(from, to, ?unknown, "unsupported encoding pair");
        Err(Error::UnsupportedEncodingPair {
            from: from.to_string(),
            to: to.to_string(),
            unknown,
        })
    }

    fn is_known(&self, name: &str) -> bool {
        self.decodes(name) || self.encodes(name)
    }

    /// Whether bytes in `name` can be brought to the canonical form
    fn decodes(&self, name: &str) -> bool {
        *self.canonical == *name || self.lookup_direct(name, &self.canonical).is_some()
    }

    /// Whether the canonical form can be brought to `name`
    fn encodes(&self, name: &str) -> bool {
        *self.canonical == *name || self.lookup_direct(&self.canonical, name).is_some()
    }
}

/// Assembles a [`Registry`]; rejects conflicting entries as they are added
#[derive(Debug)]
pub struct RegistryBuilder {
    canonical: Arc<str>,
    routes: HashMap<Arc<str>, HashMap<Arc<str>, Stage>>,
}

impl RegistryBuilder {
    /// Empty builder bridging through `canonical`
    pub fn new(canonical: &str) -> Self {
        Self {
            canonical: canonical.into(),
            routes: HashMap::new(),
        }
    }

    /// Register the canonical-bound transforms of `name`
    pub fn register(
        &mut self,
        name: &str,
        decoder: TransformFactory,
        encoder: TransformFactory,
    ) -> Result<&mut Self> {
        if *self.canonical == *name {
            return Err(Error::SelfRegistration {
                name: name.to_string(),
            });
        }
        let canonical = self.canonical.clone();
        self.check_vacant(name, &canonical)?;
        self.check_vacant(&canonical, name)?;
        self.insert(name, &canonical, decoder);
        self.insert(&canonical, name, encoder);
        Ok(self)
    }

    /// Register both directions supplied by `codec`
    pub fn register_codec(&mut self, name: &str, codec: Arc<dyn Codec>) -> Result<&mut Self> {
        let decoder = TransformFactory::decoder(codec.clone());
        let encoder = TransformFactory::encoder(codec);
        self.register(name, decoder, encoder)
    }

    /// Register a transform used for exactly `(from, to)`, ahead of any bridge
    pub fn register_direct(
        &mut self,
        from: &str,
        to: &str,
        transform: TransformFactory,
    ) -> Result<&mut Self> {
        if from == to {
            return Err(Error::SelfRegistration {
                name: from.to_string(),
            });
        }
        self.check_vacant(from, to)?;
        self.insert(from, to, transform);
        Ok(self)
    }

    /// Freeze the table
    pub fn build(self) -> Registry {
        let registry = Registry {
            canonical: self.canonical,
            routes: self.routes,
        };
        debug!(
            canonical = %registry.canonical,
            encodings = registry.encodings().len(),
            "encoding registry built"
        );
        registry
    }

    fn check_vacant(&self, from: &str, to: &str) -> Result<()> {
        let taken = self
            .routes
            .get(from)
            .is_some_and(|targets| targets.contains_key(to));
        if taken {
            return Err(Error::DuplicateRegistration {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, from: &str, to: &str, factory: TransformFactory) {
        let stage = Stage {
            from: from.into(),
            to: to.into(),
            factory,
        };
        self.routes
            .entry(stage.from.clone())
            .or_default()
            .insert(stage.to.clone(), stage);
    }
}
