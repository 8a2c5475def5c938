//! The set of models the inference server reports as available.

/// One installed model, identified by name (e.g. `"llama3.2:1b"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Model {
    name: String,
}

impl Model {
    /// Wrap a model name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The model identifier as sent in `/api/chat` requests.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered list of [`Model`]s.
///
/// A catalog is replaced wholesale, never edited in place: the only way to
/// change the models a client knows about is to swap in a new `Catalog`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    models: Vec<Model>,
}

impl Catalog {
    /// Build a catalog preserving the given order.
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// All models in server order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the server reported no models.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The first model, used as the fallback selection.
    pub fn first(&self) -> Option<&Model> {
        self.models.first()
    }

    /// Whether a model with this exact name is listed.
    pub fn contains(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// Model names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(Model::name)
    }
}

impl FromIterator<Model> for Catalog {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
