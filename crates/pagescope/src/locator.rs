//! Scope locator strategies.
//!
//! A [`LocatorSpec`] is the resolved, declarative description of what to
//! look for; a [`ScopeLocateStrategy`] turns it into live element handles
//! under a [`SearchContext`]; a [`ScopeFilter`] narrows the candidates by
//! visibility, content and 1-based index.
//!
//! Strategies are bound to locator kinds through a [`StrategyRegistry`] when
//! a component is attached, not looked up on every access.

use crate::driver::{Driver, ElementHandle, SearchContext};
use crate::metadata::ComponentMetadata;
use crate::result::{PageError, PageResult};
use crate::term::MatchKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Tag identifying how a component is found
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// `id` attribute
    Id,
    /// `name` attribute
    Name,
    /// Class list
    Class,
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Text content of elements with the component's tag
    Content,
    /// N-th element with the component's tag
    Index,
    /// `data-testid` attribute
    TestId,
    /// User-registered strategy
    Custom(String),
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Name => f.write_str("name"),
            Self::Class => f.write_str("class"),
            Self::Css => f.write_str("css"),
            Self::XPath => f.write_str("xpath"),
            Self::Content => f.write_str("content"),
            Self::Index => f.write_str("index"),
            Self::TestId => f.write_str("test-id"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Element visibility requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Any element regardless of display state
    #[default]
    Any,
    /// Displayed elements only
    Visible,
    /// Hidden elements only
    Hidden,
}

/// Resolved locator: kind, terms and comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSpec {
    /// Locator kind
    pub kind: LocatorKind,
    /// Terms to search for (any may match)
    pub terms: Vec<String>,
    /// How terms compare against the DOM
    pub match_kind: MatchKind,
    /// Element tag the component expects (e.g. `input`, `h4`)
    pub tag: Option<String>,
}

impl LocatorSpec {
    /// Create a spec matching terms exactly
    #[must_use]
    pub fn new(kind: LocatorKind, terms: Vec<String>) -> Self {
        Self {
            kind,
            terms,
            match_kind: MatchKind::Equals,
            tag: None,
        }
    }

    /// CSS selector spec
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, vec![selector.into()])
    }

    /// Set the match kind
    #[must_use]
    pub const fn with_match(mut self, kind: MatchKind) -> Self {
        self.match_kind = kind;
        self
    }

    /// Set the expected tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Tag selector, `*` when the component declares none
    #[must_use]
    pub fn tag_selector(&self) -> &str {
        self.tag.as_deref().unwrap_or("*")
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.terms.is_empty() {
            write!(f, " {} {:?}", self.match_kind, self.terms)?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " <{tag}>")?;
        }
        Ok(())
    }
}

/// Content filter: keep elements whose text matches any value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
    /// Comparison
    pub match_kind: MatchKind,
    /// Candidate texts
    pub values: Vec<String>,
}

/// Narrowing applied to located candidates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeFilter {
    /// 1-based position among the remaining candidates
    pub index: Option<usize>,
    /// Visibility requirement
    pub visibility: Visibility,
    /// Text content requirement
    pub content: Option<ContentFilter>,
}

impl ScopeFilter {
    /// Filter that keeps everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the n-th (1-based) candidate
    #[must_use]
    pub const fn by_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Keep candidates with the given visibility
    #[must_use]
    pub const fn by_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Keep candidates whose text matches any value
    #[must_use]
    pub fn by_content(mut self, match_kind: MatchKind, values: Vec<String>) -> Self {
        self.content = Some(ContentFilter { match_kind, values });
        self
    }

    /// Whether the filter narrows to a single position
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Apply visibility, then content, then index
    pub fn apply(
        &self,
        driver: &dyn Driver,
        candidates: Vec<ElementHandle>,
    ) -> PageResult<Vec<ElementHandle>> {
        let mut kept = Vec::with_capacity(candidates.len());
        for handle in candidates {
            let visible_ok = match self.visibility {
                Visibility::Any => true,
                Visibility::Visible => driver.is_displayed(&handle)?,
                Visibility::Hidden => !driver.is_displayed(&handle)?,
            };
            if !visible_ok {
                continue;
            }
            if let Some(content) = &self.content {
                let text = driver.read_text(&handle)?;
                if !content.match_kind.matches_any(&content.values, text.trim())? {
                    continue;
                }
            }
            kept.push(handle);
        }

        match self.index {
            Some(index) => Ok(index
                .checked_sub(1)
                .and_then(|i| kept.into_iter().nth(i))
                .into_iter()
                .collect()),
            None => Ok(kept),
        }
    }
}

/// Algorithm turning component metadata into live element handles
pub trait ScopeLocateStrategy: fmt::Debug {
    /// Candidates under `context`. The caller applies `filter` afterwards;
    /// strategies may use it to narrow their query.
    fn locate(
        &self,
        driver: &dyn Driver,
        metadata: &ComponentMetadata,
        context: &SearchContext,
        filter: &ScopeFilter,
    ) -> PageResult<Vec<ElementHandle>>;

    /// Name for diagnostics
    fn name(&self) -> &str;
}

/// Forwards the component's locator to the driver unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverQueryStrategy;

impl ScopeLocateStrategy for DriverQueryStrategy {
    fn locate(
        &self,
        driver: &dyn Driver,
        metadata: &ComponentMetadata,
        context: &SearchContext,
        _filter: &ScopeFilter,
    ) -> PageResult<Vec<ElementHandle>> {
        driver.find_elements(context, &metadata.locator)
    }

    fn name(&self) -> &str {
        "driver query"
    }
}

/// Elements with the component's tag whose text matches the locator terms
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentStrategy;

impl ScopeLocateStrategy for ContentStrategy {
    fn locate(
        &self,
        driver: &dyn Driver,
        metadata: &ComponentMetadata,
        context: &SearchContext,
        _filter: &ScopeFilter,
    ) -> PageResult<Vec<ElementHandle>> {
        let locator = &metadata.locator;
        let by_tag = LocatorSpec::css(locator.tag_selector());
        let candidates = driver.find_elements(context, &by_tag)?;
        let by_content = ScopeFilter::new().by_content(locator.match_kind, locator.terms.clone());
        by_content.apply(driver, candidates)
    }

    fn name(&self) -> &str {
        "content"
    }
}

/// Every element with the component's tag; the index filter picks one
#[derive(Debug, Clone, Copy, Default)]
pub struct TagStrategy;

impl ScopeLocateStrategy for TagStrategy {
    fn locate(
        &self,
        driver: &dyn Driver,
        metadata: &ComponentMetadata,
        context: &SearchContext,
        _filter: &ScopeFilter,
    ) -> PageResult<Vec<ElementHandle>> {
        let by_tag = LocatorSpec::css(metadata.locator.tag_selector());
        driver.find_elements(context, &by_tag)
    }

    fn name(&self) -> &str {
        "tag"
    }
}

/// Locator kind to strategy map
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<LocatorKind, Rc<dyn ScopeLocateStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let query: Rc<dyn ScopeLocateStrategy> = Rc::new(DriverQueryStrategy);
        let mut strategies = HashMap::new();
        for kind in [
            LocatorKind::Id,
            LocatorKind::Name,
            LocatorKind::Class,
            LocatorKind::Css,
            LocatorKind::XPath,
            LocatorKind::TestId,
        ] {
            let _ = strategies.insert(kind, Rc::clone(&query));
        }
        let _ = strategies.insert(LocatorKind::Content, Rc::new(ContentStrategy) as _);
        let _ = strategies.insert(LocatorKind::Index, Rc::new(TagStrategy) as _);
        Self { strategies }
    }
}

impl StrategyRegistry {
    /// Registry with the built-in strategies
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a strategy to a locator kind
    pub fn register(&mut self, kind: LocatorKind, strategy: Rc<dyn ScopeLocateStrategy>) {
        let _ = self.strategies.insert(kind, strategy);
    }

    /// Strategy bound to `kind`
    pub fn resolve(&self, kind: &LocatorKind) -> PageResult<Rc<dyn ScopeLocateStrategy>> {
        self.strategies
            .get(kind)
            .cloned()
            .ok_or_else(|| PageError::UnknownStrategy {
                kind: kind.to_string(),
            })
    }

    /// Whether a strategy is bound to `kind`
    #[must_use]
    pub fn contains(&self, kind: &LocatorKind) -> bool {
        self.strategies.contains_key(kind)
    }
}
