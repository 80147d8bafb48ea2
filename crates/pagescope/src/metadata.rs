//! Component declarations and their resolved metadata.
//!
//! A component is declared with a [`ComponentSpec`]: a name, a type name
//! and an ordered list of [`Attribute`]s. When the component is attached to
//! a page, [`MetadataBuilder`] resolves the declaration against the parent's
//! metadata and the page configuration. `Inherit` settings fall back to the
//! component's own defaults, then to the parent, then to the configuration.

use crate::config::PageConfig;
use crate::data::{DataSource, DispatchSetValue, RandomizeSettings, ValueSetter};
use crate::locator::{LocatorKind, LocatorSpec, ScopeFilter, Visibility};
use crate::result::{PageError, PageResult};
use crate::term::{MatchKind, TermFormat};
use crate::trigger::TriggerAttribute;
use std::fmt;
use std::rc::Rc;

/// Index of a component in its page's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// Arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a component is found inside its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindBy {
    /// Locator kind
    pub kind: LocatorKind,
    /// Explicit terms; empty means derive one from the component name
    pub values: Vec<String>,
    /// Format used to derive a term from the name
    pub format: TermFormat,
    /// Comparison against the DOM
    pub match_kind: MatchKind,
    /// 1-based position among candidates
    pub index: Option<usize>,
    /// Visibility requirement
    pub visibility: Visibility,
}

impl FindBy {
    /// Locate by `kind`, deriving the term from the component name
    #[must_use]
    pub const fn new(kind: LocatorKind) -> Self {
        Self {
            kind,
            values: Vec::new(),
            format: TermFormat::Inherit,
            match_kind: MatchKind::Inherit,
            index: None,
            visibility: Visibility::Any,
        }
    }

    fn with_value(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self::new(kind).with_values([value])
    }

    /// `id` attribute
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::Id, value)
    }

    /// `name` attribute
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::Name, value)
    }

    /// Class list
    #[must_use]
    pub fn class(value: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::Class, value)
    }

    /// CSS selector, matched verbatim
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::Css, selector).with_match(MatchKind::Equals)
    }

    /// XPath expression, matched verbatim
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::XPath, expression).with_match(MatchKind::Equals)
    }

    /// Text content of elements with the component's tag
    #[must_use]
    pub fn content(value: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::Content, value)
    }

    /// `data-testid` attribute
    #[must_use]
    pub fn test_id(value: impl Into<String>) -> Self {
        Self::with_value(LocatorKind::TestId, value)
    }

    /// N-th (1-based) element with the component's tag
    #[must_use]
    pub const fn index(index: usize) -> Self {
        let mut find = Self::new(LocatorKind::Index);
        find.index = Some(index);
        find
    }

    /// User-registered strategy
    #[must_use]
    pub fn custom(kind: impl Into<String>) -> Self {
        Self::new(LocatorKind::Custom(kind.into()))
    }

    /// Replace the terms
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the name format
    #[must_use]
    pub const fn with_format(mut self, format: TermFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the comparison
    #[must_use]
    pub const fn with_match(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }

    /// Pick the n-th (1-based) candidate
    #[must_use]
    pub const fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Only displayed elements
    #[must_use]
    pub const fn visible(mut self) -> Self {
        self.visibility = Visibility::Visible;
        self
    }

    /// Only hidden elements
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visibility = Visibility::Hidden;
        self
    }

    /// Format a kind applies to names when nothing more specific is set
    const fn kind_format(&self) -> TermFormat {
        match self.kind {
            LocatorKind::Id | LocatorKind::Class | LocatorKind::TestId => TermFormat::Kebab,
            LocatorKind::Name => TermFormat::Lower,
            _ => TermFormat::Inherit,
        }
    }
}

/// A declarative setting attached to a component
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Locator
    Find(FindBy),
    /// Trigger
    Trigger(TriggerAttribute),
    /// Term format for this component and its descendants
    Format(TermFormat),
    /// Match kind for this component and its descendants
    Match(MatchKind),
    /// Value description template; `{}` is replaced by the raw value
    ValueFormat(String),
    /// Random value constraints
    Randomize(RandomizeSettings),
    /// Where the component's value is read from
    Source(DataSource),
    /// How the component's value is written
    Setter(Rc<dyn ValueSetter>),
    /// Expected element tag
    Tag(String),
}

/// Declaration of a component
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    /// Human-facing name
    pub name: String,
    /// Type name, e.g. `TextInput`
    pub component_type: String,
    /// Attributes in declaration order
    pub attributes: Vec<Attribute>,
}

impl ComponentSpec {
    /// Declare a component
    #[must_use]
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the locator
    #[must_use]
    pub fn find(self, find: FindBy) -> Self {
        self.attribute(Attribute::Find(find))
    }

    /// Add a trigger
    #[must_use]
    pub fn trigger(self, trigger: TriggerAttribute) -> Self {
        self.attribute(Attribute::Trigger(trigger))
    }

    /// Set the term format
    #[must_use]
    pub fn format(self, format: TermFormat) -> Self {
        self.attribute(Attribute::Format(format))
    }

    /// Set the match kind
    #[must_use]
    pub fn match_kind(self, kind: MatchKind) -> Self {
        self.attribute(Attribute::Match(kind))
    }

    /// Set the value description template
    #[must_use]
    pub fn value_format(self, template: impl Into<String>) -> Self {
        self.attribute(Attribute::ValueFormat(template.into()))
    }

    /// Set random value constraints
    #[must_use]
    pub fn randomize(self, settings: RandomizeSettings) -> Self {
        self.attribute(Attribute::Randomize(settings))
    }

    /// Set the value source
    #[must_use]
    pub fn source(self, source: DataSource) -> Self {
        self.attribute(Attribute::Source(source))
    }

    /// Set the value setter
    #[must_use]
    pub fn setter(self, setter: impl ValueSetter + 'static) -> Self {
        self.attribute(Attribute::Setter(Rc::new(setter)))
    }

    /// Set the expected element tag
    #[must_use]
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.attribute(Attribute::Tag(tag.into()))
    }
}

/// Resolved, immutable description of an attached component
#[derive(Debug, Clone)]
pub struct ComponentMetadata {
    /// Human-facing name
    pub name: String,
    /// Type name
    pub component_type: String,
    /// Parent component; `None` for the page itself
    pub parent: Option<ComponentId>,
    /// Resolved locator
    pub locator: LocatorSpec,
    /// Narrowing applied to candidates
    pub filter: ScopeFilter,
    /// Term format inherited by descendants
    pub format: TermFormat,
    /// Match kind inherited by descendants
    pub match_kind: MatchKind,
    /// Value description template
    pub value_format: Option<String>,
    /// Declared triggers, in declaration order
    pub triggers: Vec<TriggerAttribute>,
    /// Value source
    pub source: DataSource,
    /// Value setter
    pub setter: Rc<dyn ValueSetter>,
    /// Random value constraints
    pub randomize: RandomizeSettings,
}

impl ComponentMetadata {
    /// Metadata of the page itself
    #[must_use]
    pub fn page(name: impl Into<String>, config: &PageConfig) -> Self {
        Self {
            name: name.into(),
            component_type: "Page".to_string(),
            parent: None,
            locator: LocatorSpec::css("html"),
            filter: ScopeFilter::new(),
            format: config.default_format,
            match_kind: config.default_match,
            value_format: None,
            triggers: Vec::new(),
            source: DataSource::Text,
            setter: Rc::new(DispatchSetValue),
            randomize: RandomizeSettings::default(),
        }
    }

    /// Name used in logs and error messages, e.g. `"Email" text input`
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "\"{}\" {}",
            self.name,
            TermFormat::Lower.apply(&self.component_type)
        )
    }

    /// Render a raw value through the value description template
    #[must_use]
    pub fn describe_value(&self, raw: &str) -> String {
        match &self.value_format {
            Some(template) => template.replace("{}", raw),
            None => format!("{raw:?}"),
        }
    }
}

/// Resolves a [`ComponentSpec`] into [`ComponentMetadata`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBuilder;

impl MetadataBuilder {
    /// Resolve `spec` as a child of the component described by `parent`
    pub fn build(
        spec: &ComponentSpec,
        parent_id: ComponentId,
        parent: &ComponentMetadata,
        config: &PageConfig,
    ) -> PageResult<ComponentMetadata> {
        let invalid = |message: &str| PageError::InvalidMetadata {
            component: format!("\"{}\" {}", spec.name, spec.component_type),
            message: message.to_string(),
        };

        let mut find: Option<&FindBy> = None;
        let mut own_format = TermFormat::Inherit;
        let mut own_match = MatchKind::Inherit;
        let mut value_format = None;
        let mut triggers = Vec::new();
        let mut source = None;
        let mut setter = None;
        let mut randomize = None;
        let mut tag = None;

        for attribute in &spec.attributes {
            match attribute {
                Attribute::Find(f) => {
                    if find.is_some() {
                        return Err(invalid("more than one locator declared"));
                    }
                    find = Some(f);
                }
                Attribute::Trigger(t) => triggers.push(t.clone()),
                Attribute::Format(f) => own_format = *f,
                Attribute::Match(m) => own_match = *m,
                Attribute::ValueFormat(t) => value_format = Some(t.clone()),
                Attribute::Randomize(r) => randomize = Some(r.clone()),
                Attribute::Source(s) => source = Some(s.clone()),
                Attribute::Setter(s) => setter = Some(Rc::clone(s)),
                Attribute::Tag(t) => tag = Some(t.clone()),
            }
        }

        let find = find.ok_or_else(|| invalid("no locator declared"))?;
        if find.kind == LocatorKind::Index && tag.is_none() {
            return Err(invalid("index locators need an element tag"));
        }

        let format = own_format.resolve(parent.format).resolve(config.default_format);
        let match_kind = own_match.resolve(parent.match_kind).resolve(config.default_match);

        let term_format = find
            .format
            .resolve(own_format)
            .resolve(find.kind_format())
            .resolve(format);
        let terms = if find.values.is_empty() && find.kind != LocatorKind::Index {
            vec![term_format.apply(&spec.name)]
        } else {
            find.values.clone()
        };
        if terms.iter().any(String::is_empty) {
            return Err(invalid("locator term is empty"));
        }

        let mut locator =
            LocatorSpec::new(find.kind.clone(), terms).with_match(find.match_kind.resolve(match_kind));
        locator.tag = tag;

        let mut filter = ScopeFilter::new().by_visibility(find.visibility);
        filter.index = find.index;

        tracing::trace!(component = %spec.name, %locator, "resolved component metadata");

        Ok(ComponentMetadata {
            name: spec.name.clone(),
            component_type: spec.component_type.clone(),
            parent: Some(parent_id),
            locator,
            filter,
            format,
            match_kind,
            value_format,
            triggers,
            source: source.unwrap_or_default(),
            setter: setter.unwrap_or_else(|| Rc::new(DispatchSetValue)),
            randomize: randomize.unwrap_or_default(),
        })
    }
}
