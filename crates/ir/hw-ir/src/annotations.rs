//! Annotations: free-form metadata attached to declarations and ports

use hw_intern::Symbol;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Marks a declaration that later passes must not optimise away
pub const DONT_TOUCH_CLASS: &str = "firrtl.transforms.DontTouchAnnotation";

/// Signal driver annotation; carries its own `fieldID` member
pub const SIGNAL_DRIVER_CLASS: &str = "sifive.enterprise.grandcentral.SignalDriverAnnotation";

/// Key of the member adjusted on field-ID-sensitive annotations
pub const FIELD_ID_MEMBER: &str = "fieldID";

/// One annotation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation class name
    pub class: String,
    /// Sub-field the annotation targets, `None` for the whole value
    pub field_id: Option<u64>,
    /// Hierarchical path this annotation is scoped to
    pub nonlocal: Option<Symbol>,
    /// Remaining members
    #[serde(default)]
    pub members: IndexMap<String, serde_json::Value>,
}

impl Annotation {
    /// Annotation of `class` with no members
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            field_id: None,
            nonlocal: None,
            members: IndexMap::new(),
        }
    }

    /// Sets the targeted field ID
    #[must_use]
    pub fn with_field_id(mut self, field_id: u64) -> Self {
        self.field_id = Some(field_id);
        self
    }

    /// Scopes the annotation to hierarchical path `path`
    #[must_use]
    pub fn with_nonlocal(mut self, path: Symbol) -> Self {
        self.nonlocal = Some(path);
        self
    }

    /// Adds a member
    #[must_use]
    pub fn with_member(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.members.insert(key.into(), value);
        self
    }

    /// Returns true if the annotation has class `class`
    pub fn is_class(&self, class: &str) -> bool {
        self.class == class
    }

    /// Field ID the annotation applies to, 0 when it targets the whole value
    pub fn target_field_id(&self) -> u64 {
        self.field_id.unwrap_or(0)
    }
}

/// Ordered list of annotations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet(pub Vec<Annotation>);

impl AnnotationSet {
    /// Empty set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of annotations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the annotations in order
    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.0.iter()
    }

    /// Mutable iterator over the annotations
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Annotation> {
        self.0.iter_mut()
    }

    /// Appends one annotation
    pub fn push(&mut self, anno: Annotation) {
        self.0.push(anno);
    }

    /// Keeps only the annotations matching `keep`
    pub fn retain(&mut self, keep: impl FnMut(&Annotation) -> bool) {
        self.0.retain(keep);
    }

    /// Returns true if any annotation has class `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.0.iter().any(|anno| anno.is_class(class))
    }

    /// Rewrites every `nonlocal` reference to `from` into `to`, returning how many changed
    pub fn redirect_nonlocal(&mut self, from: Symbol, to: Symbol) -> usize {
        let mut changed = 0;
        for anno in &mut self.0 {
            if anno.nonlocal == Some(from) {
                anno.nonlocal = Some(to);
                changed += 1;
            }
        }
        changed
    }
}

impl Extend<Annotation> for AnnotationSet {
    fn extend<T: IntoIterator<Item = Annotation>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AnnotationSet {
    type Item = Annotation;
    type IntoIter = std::vec::IntoIter<Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
