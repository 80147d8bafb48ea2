//! Typed value access for components.
//!
//! A [`DataProvider`] reads a component's raw value from its scope through a
//! [`DataSource`] and converts it with [`FieldValue`]. Writes go through a
//! [`ValueSetter`]; random values come from a [`Randomizer`].

use crate::driver::{Driver, ElementHandle};
use crate::log::LogSection;
use crate::metadata::ComponentId;
use crate::page::PageObject;
use crate::result::{PageError, PageResult};
use crate::trigger::TriggerEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Where a component's raw value is read from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Visible text content
    #[default]
    Text,
    /// `value` attribute
    Value,
    /// Named attribute
    Attribute(String),
    /// `"true"` when the named attribute is present
    AttributePresent(String),
}

impl DataSource {
    /// Read the raw value; `None` when an attribute is absent
    pub fn read(&self, driver: &dyn Driver, handle: &ElementHandle) -> PageResult<Option<String>> {
        match self {
            Self::Text => driver.read_text(handle).map(|t| Some(t.trim().to_string())),
            Self::Value => driver.read_attribute(handle, "value"),
            Self::Attribute(name) => driver.read_attribute(handle, name),
            Self::AttributePresent(name) => Ok(Some(
                driver.read_attribute(handle, name)?.is_some().to_string(),
            )),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text content"),
            Self::Value => f.write_str("value"),
            Self::Attribute(name) => write!(f, "\"{name}\" attribute"),
            Self::AttributePresent(name) => write!(f, "\"{name}\" state"),
        }
    }
}

/// Kind of random value a type asks a [`Randomizer`] for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandomKind {
    /// Free text
    Text,
    /// Whole number
    Integer,
    /// Decimal number
    Float,
    /// `true`/`false`
    Boolean,
}

/// Value types a component can hold
pub trait FieldValue: Sized + fmt::Debug + Clone {
    /// Name used in conversion errors
    const TYPE_NAME: &'static str;

    /// Kind of random value to generate
    const RANDOM_KIND: RandomKind;

    /// Parse a raw scope value; `None` when it does not convert
    fn from_raw(raw: Option<&str>) -> Option<Self>;

    /// Raw representation handed to setters
    fn to_raw(&self) -> String;
}

impl FieldValue for String {
    const TYPE_NAME: &'static str = "string";
    const RANDOM_KIND: RandomKind = RandomKind::Text;

    fn from_raw(raw: Option<&str>) -> Option<Self> {
        Some(raw.unwrap_or_default().to_string())
    }

    fn to_raw(&self) -> String {
        self.clone()
    }
}

impl FieldValue for bool {
    const TYPE_NAME: &'static str = "bool";
    const RANDOM_KIND: RandomKind = RandomKind::Boolean;

    fn from_raw(raw: Option<&str>) -> Option<Self> {
        let Some(raw) = raw else {
            return Some(false);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "checked" | "1" => Some(true),
            "false" | "off" | "no" | "" | "0" => Some(false),
            _ => None,
        }
    }

    fn to_raw(&self) -> String {
        self.to_string()
    }
}

impl FieldValue for i64 {
    const TYPE_NAME: &'static str = "integer";
    const RANDOM_KIND: RandomKind = RandomKind::Integer;

    fn from_raw(raw: Option<&str>) -> Option<Self> {
        raw?.trim().parse().ok()
    }

    fn to_raw(&self) -> String {
        self.to_string()
    }
}

impl FieldValue for f64 {
    const TYPE_NAME: &'static str = "number";
    const RANDOM_KIND: RandomKind = RandomKind::Float;

    fn from_raw(raw: Option<&str>) -> Option<Self> {
        raw?.trim().parse().ok()
    }

    fn to_raw(&self) -> String {
        self.to_string()
    }
}

/// Writes a raw value into an element
pub trait ValueSetter: fmt::Debug {
    /// Write `raw` into the element
    fn set_value(&self, driver: &dyn Driver, handle: &ElementHandle, raw: &str) -> PageResult<()>;

    /// Name for diagnostics
    fn name(&self) -> &str;
}

/// Replaces the element's value through the driver
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSetValue;

impl ValueSetter for DispatchSetValue {
    fn set_value(&self, driver: &dyn Driver, handle: &ElementHandle, raw: &str) -> PageResult<()> {
        driver.dispatch_set_value(handle, raw)
    }

    fn name(&self) -> &str {
        "set value"
    }
}

/// Clicks a checkbox until its `checked` state matches a boolean raw value
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckboxSetter;

impl ValueSetter for CheckboxSetter {
    fn set_value(&self, driver: &dyn Driver, handle: &ElementHandle, raw: &str) -> PageResult<()> {
        let wanted = bool::from_raw(Some(raw)).ok_or_else(|| PageError::Conversion {
            component: handle.to_string(),
            value: raw.to_string(),
            target: bool::TYPE_NAME,
        })?;
        let checked = driver.read_attribute(handle, "checked")?.is_some();
        if checked != wanted {
            driver.dispatch_click(handle)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "checkbox"
    }
}

/// Constraints for generated values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizeSettings {
    /// Minimum text length
    pub min_length: usize,
    /// Maximum text length
    pub max_length: usize,
    /// Prefix for generated text
    pub prefix: Option<String>,
    /// Inclusive lower bound for numbers
    pub min: i64,
    /// Inclusive upper bound for numbers
    pub max: i64,
    /// Pick from these values instead of generating
    pub include: Vec<String>,
}

impl Default for RandomizeSettings {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 8,
            prefix: None,
            min: 0,
            max: 100,
            include: Vec::new(),
        }
    }
}

impl RandomizeSettings {
    /// Text length bounds
    #[must_use]
    pub const fn with_length(mut self, min: usize, max: usize) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Number bounds
    #[must_use]
    pub const fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Text prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Fixed candidate set
    #[must_use]
    pub fn with_include<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Source of random raw values
pub trait Randomizer: fmt::Debug {
    /// Generate a raw value of `kind` within `settings`
    fn generate(&mut self, kind: RandomKind, settings: &RandomizeSettings) -> PageResult<String>;
}

/// [`Randomizer`] backed by `rand`'s standard generator
#[derive(Debug, Clone)]
pub struct StdRandomizer {
    rng: StdRng,
}

impl Default for StdRandomizer {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl StdRandomizer {
    /// Seed from the operating system
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Randomizer for StdRandomizer {
    fn generate(&mut self, kind: RandomKind, settings: &RandomizeSettings) -> PageResult<String> {
        if !settings.include.is_empty() {
            let pick = self.rng.gen_range(0..settings.include.len());
            return Ok(settings.include[pick].clone());
        }
        let invalid = |what: &str| PageError::InvalidMetadata {
            component: "randomizer".into(),
            message: format!("invalid {what} bounds"),
        };
        match kind {
            RandomKind::Text => {
                if settings.min_length > settings.max_length {
                    return Err(invalid("length"));
                }
                let len = self.rng.gen_range(settings.min_length..=settings.max_length);
                let body: String = (&mut self.rng)
                    .sample_iter(rand::distributions::Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect();
                Ok(format!("{}{body}", settings.prefix.as_deref().unwrap_or_default()))
            }
            RandomKind::Integer => {
                if settings.min > settings.max {
                    return Err(invalid("number"));
                }
                Ok(self.rng.gen_range(settings.min..=settings.max).to_string())
            }
            RandomKind::Float => {
                if settings.min > settings.max {
                    return Err(invalid("number"));
                }
                #[allow(clippy::cast_precision_loss)]
                let value = self.rng.gen_range(settings.min as f64..=settings.max as f64);
                Ok(format!("{value:.2}"))
            }
            RandomKind::Boolean => Ok(self.rng.gen_bool(0.5).to_string()),
        }
    }
}

/// Typed read access to a component's value
#[derive(Debug, Clone)]
pub struct DataProvider<T> {
    component: ComponentId,
    source: Option<DataSource>,
    _value: PhantomData<T>,
}

impl<T: FieldValue> DataProvider<T> {
    /// Provider reading through the component's declared source
    #[must_use]
    pub const fn new(component: ComponentId) -> Self {
        Self {
            component,
            source: None,
            _value: PhantomData,
        }
    }

    /// Provider reading through an explicit source
    #[must_use]
    pub const fn with_source(component: ComponentId, source: DataSource) -> Self {
        Self {
            component,
            source: Some(source),
            _value: PhantomData,
        }
    }

    /// Component read by this provider
    #[must_use]
    pub const fn component(&self) -> ComponentId {
        self.component
    }

    /// Source the provider reads, resolved against the component
    pub fn source(&self, page: &PageObject) -> PageResult<DataSource> {
        match &self.source {
            Some(source) => Ok(source.clone()),
            None => Ok(page.metadata(self.component)?.source.clone()),
        }
    }

    /// Raw value, bracketed by `BeforeGet`/`AfterGet`
    pub fn get_raw(&self, page: &mut PageObject) -> PageResult<Option<String>> {
        let source = self.source(page)?;
        page.fire(self.component, TriggerEvent::BeforeGet)?;
        let raw = page.access(self.component, |driver, handle| source.read(driver, handle))?;
        page.fire(self.component, TriggerEvent::AfterGet)?;
        Ok(raw)
    }

    /// Current value converted to `T`
    pub fn get(&self, page: &mut PageObject) -> PageResult<T> {
        let raw = self.get_raw(page)?;
        T::from_raw(raw.as_deref()).ok_or_else(|| PageError::Conversion {
            component: page
                .metadata(self.component)
                .map_or_else(|_| self.component.to_string(), |m| m.display_name()),
            value: raw.unwrap_or_default(),
            target: T::TYPE_NAME,
        })
    }

    /// Write `value` through the component's setter.
    ///
    /// Order: `BeforeSet`, data-setting log section, `BeforeAccess`, setter,
    /// `AfterAccess`, section end, `AfterSet`.
    pub fn set(&self, page: &mut PageObject, value: &T) -> PageResult<()> {
        let raw = value.to_raw();
        let metadata = page.metadata(self.component)?;
        let setter = Rc::clone(&metadata.setter);
        let section = LogSection::DataSetting {
            component: metadata.display_name(),
            value: metadata.describe_value(&raw),
        };

        page.fire_with(self.component, TriggerEvent::BeforeSet, Some(&raw))?;
        let log = page.log_sink();
        log.start_section(&section);
        let written = page.access(self.component, |driver, handle| {
            setter.set_value(driver, handle, &raw)
        });
        log.end_section();
        written?;
        page.fire_with(self.component, TriggerEvent::AfterSet, Some(&raw))
    }

    /// Generate a value within the component's constraints, write it and
    /// return it
    pub fn set_random(&self, page: &mut PageObject) -> PageResult<T> {
        let metadata = page.metadata(self.component)?;
        let settings = metadata.randomize.clone();
        let component = metadata.display_name();
        let raw = page.randomize(T::RANDOM_KIND, &settings)?;
        let value = T::from_raw(Some(&raw)).ok_or_else(|| PageError::Conversion {
            component,
            value: raw,
            target: T::TYPE_NAME,
        })?;
        self.set(page, &value)?;
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::log::{LogEntry, RecordingLogSink};
    use crate::metadata::{ComponentSpec, FindBy};
    use crate::mock::{MockDom, MockDriver, MockElement};
    use proptest::prelude::*;

    fn form() -> (PageObject, MockDriver, RecordingLogSink) {
        let mut dom = MockDom::new();
        let form = dom.append(dom.root(), MockElement::new("form").id("profile"));
        let _ = dom.append(form, MockElement::new("input").id("name").value("Ada"));
        let _ = dom.append(form, MockElement::new("input").id("age").value("36"));
        let _ = dom.append(form, MockElement::new("input").id("score").value("7.5"));
        let _ = dom.append(
            form,
            MockElement::new("input").id("agree").attr("type", "checkbox"),
        );
        let _ = dom.append(form, MockElement::new("a").id("docs").attr("href", "/docs").text(" Docs "));
        let driver = MockDriver::new(dom);
        let log = RecordingLogSink::new();
        let page = PageObject::builder("Profile", driver.clone())
            .clock(ManualClock::new())
            .log_sink(log.clone())
            .build();
        (page, driver, log)
    }

    fn field(page: &mut PageObject, id: &str, spec: ComponentSpec) -> ComponentId {
        page.add_component(page.root(), spec.find(FindBy::id(id))).unwrap()
    }

    mod source_tests {
        use super::*;

        #[test]
        fn test_text_is_trimmed() {
            let (mut page, _, _) = form();
            let docs = field(&mut page, "docs", ComponentSpec::new("Docs", "Link"));
            assert_eq!(DataProvider::<String>::new(docs).get(&mut page).unwrap(), "Docs");
        }

        #[test]
        fn test_attribute_and_presence() {
            let (mut page, _, _) = form();
            let docs = field(&mut page, "docs", ComponentSpec::new("Docs", "Link"));
            let href = DataProvider::<String>::with_source(docs, DataSource::Attribute("href".into()));
            assert_eq!(href.get(&mut page).unwrap(), "/docs");
            let target = DataProvider::<bool>::with_source(
                docs,
                DataSource::AttributePresent("target".into()),
            );
            assert!(!target.get(&mut page).unwrap());
        }

        #[test]
        fn test_source_display() {
            assert_eq!(DataSource::Text.to_string(), "text content");
            assert_eq!(DataSource::Attribute("href".into()).to_string(), "\"href\" attribute");
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_numeric_sources() {
            let (mut page, _, _) = form();
            let age = field(&mut page, "age", ComponentSpec::new("Age", "Input").source(DataSource::Value));
            let score =
                field(&mut page, "score", ComponentSpec::new("Score", "Input").source(DataSource::Value));
            assert_eq!(DataProvider::<i64>::new(age).get(&mut page).unwrap(), 36);
            let score = DataProvider::<f64>::new(score).get(&mut page).unwrap();
            assert!((score - 7.5).abs() < f64::EPSILON);
        }

        #[test]
        fn test_conversion_failure_names_component() {
            let (mut page, _, _) = form();
            let name = field(&mut page, "name", ComponentSpec::new("Name", "Input").source(DataSource::Value));
            let err = DataProvider::<i64>::new(name).get(&mut page).unwrap_err();
            match err {
                PageError::Conversion { component, value, target } => {
                    assert_eq!(component, "\"Name\" input");
                    assert_eq!(value, "Ada");
                    assert_eq!(target, "integer");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[derive(Debug)]
        struct Events(Rc<std::cell::RefCell<Vec<TriggerEvent>>>);

        impl crate::trigger::TriggerBehavior for Events {
            fn execute(&self, ctx: &mut crate::trigger::TriggerContext<'_>) -> PageResult<()> {
                self.0.borrow_mut().push(ctx.event);
                Ok(())
            }

            fn name(&self) -> String {
                "events".into()
            }
        }

        #[test]
        fn test_get_and_get_raw_share_the_read_bracket() {
            use crate::trigger::{TriggerAttribute, TriggerEvents};

            let (mut page, _, _) = form();
            let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
            let name = field(
                &mut page,
                "name",
                ComponentSpec::new("Name", "Input")
                    .source(DataSource::Value)
                    .trigger(TriggerAttribute::new(
                        TriggerEvents::BEFORE_GET | TriggerEvents::AFTER_GET,
                        Events(Rc::clone(&seen)),
                    )),
            );
            let bracket = vec![TriggerEvent::BeforeGet, TriggerEvent::AfterGet];

            let raw = DataProvider::<i64>::new(name).get_raw(&mut page).unwrap();
            assert_eq!(raw.as_deref(), Some("Ada"));
            assert_eq!(*seen.borrow(), bracket);

            seen.borrow_mut().clear();
            assert_eq!(DataProvider::<String>::new(name).get(&mut page).unwrap(), "Ada");
            assert_eq!(*seen.borrow(), bracket);

            seen.borrow_mut().clear();
            let err = DataProvider::<i64>::new(name).get(&mut page).unwrap_err();
            assert!(matches!(err, PageError::Conversion { .. }));
            assert_eq!(*seen.borrow(), bracket);
        }

        #[test]
        fn test_bool_from_raw() {
            assert_eq!(bool::from_raw(Some("checked")), Some(true));
            assert_eq!(bool::from_raw(Some(" Off ")), Some(false));
            assert_eq!(bool::from_raw(None), Some(false));
            assert_eq!(bool::from_raw(Some("maybe")), None);
        }
    }

    mod setter_tests {
        use super::*;

        #[test]
        fn test_set_logs_section_around_write() {
            let (mut page, driver, log) = form();
            let name = field(&mut page, "name", ComponentSpec::new("Name", "TextInput").source(DataSource::Value));
            DataProvider::<String>::new(name)
                .set(&mut page, &"Grace".to_string())
                .unwrap();
            assert_eq!(
                log.entries(),
                vec![
                    LogEntry::Start(LogSection::DataSetting {
                        component: "\"Name\" text input".into(),
                        value: "\"Grace\"".into(),
                    }),
                    LogEntry::End,
                ]
            );
            let index = driver.dom().find_by_id("name").unwrap();
            assert_eq!(driver.dom().element(index).unwrap().attribute("value"), Some("Grace"));
        }

        #[test]
        fn test_failed_write_still_closes_section() {
            let (mut page, driver, log) = form();
            let index = driver.dom().find_by_id("name").unwrap();
            driver.dom_mut().set_attribute(index, "readonly", "readonly");
            let name = field(&mut page, "name", ComponentSpec::new("Name", "TextInput"));
            let err = DataProvider::<String>::new(name)
                .set(&mut page, &"x".to_string())
                .unwrap_err();
            assert!(matches!(err, PageError::Driver { .. }));
            assert_eq!(log.entries().last(), Some(&LogEntry::End));
        }

        #[test]
        fn test_checkbox_setter_is_idempotent() {
            let (mut page, driver, _) = form();
            let agree = field(
                &mut page,
                "agree",
                ComponentSpec::new("Agree", "Checkbox")
                    .source(DataSource::AttributePresent("checked".into()))
                    .setter(CheckboxSetter),
            );
            let provider = DataProvider::<bool>::new(agree);
            provider.set(&mut page, &true).unwrap();
            provider.set(&mut page, &true).unwrap();
            assert!(provider.get(&mut page).unwrap());
            let index = driver.dom().find_by_id("agree").unwrap();
            assert_eq!(driver.dom().clicks(index), 1);
            provider.set(&mut page, &false).unwrap();
            assert!(!provider.get(&mut page).unwrap());
        }
    }

    mod randomizer_tests {
        use super::*;

        #[test]
        fn test_seeded_is_reproducible() {
            let settings = RandomizeSettings::default();
            let mut a = StdRandomizer::seeded(7);
            let mut b = StdRandomizer::seeded(7);
            for kind in [RandomKind::Text, RandomKind::Integer, RandomKind::Float, RandomKind::Boolean] {
                assert_eq!(a.generate(kind, &settings).unwrap(), b.generate(kind, &settings).unwrap());
            }
        }

        #[test]
        fn test_include_picks_member() {
            let settings = RandomizeSettings::default().with_include(["red", "green"]);
            let mut r = StdRandomizer::seeded(1);
            let value = r.generate(RandomKind::Text, &settings).unwrap();
            assert!(value == "red" || value == "green");
        }

        #[test]
        fn test_inverted_bounds_rejected() {
            let settings = RandomizeSettings::default().with_range(5, 1);
            let mut r = StdRandomizer::seeded(1);
            assert!(r.generate(RandomKind::Integer, &settings).is_err());
        }

        #[test]
        fn test_set_random_round_trips() {
            let (mut page, _, _) = form();
            let name = field(
                &mut page,
                "name",
                ComponentSpec::new("Name", "TextInput")
                    .source(DataSource::Value)
                    .randomize(RandomizeSettings::default().with_prefix("user-")),
            );
            let provider = DataProvider::<String>::new(name);
            let generated = provider.set_random(&mut page).unwrap();
            assert!(generated.starts_with("user-"));
            assert_eq!(provider.get(&mut page).unwrap(), generated);
        }
    }

    proptest! {
        #[test]
        fn prop_text_respects_length_and_prefix(min in 0usize..10, extra in 0usize..10, seed in any::<u64>()) {
            let settings = RandomizeSettings::default()
                .with_length(min, min + extra)
                .with_prefix("p");
            let value = StdRandomizer::seeded(seed).generate(RandomKind::Text, &settings).unwrap();
            prop_assert!(value.starts_with('p'));
            let body = value.len() - 1;
            prop_assert!(body >= min && body <= min + extra);
        }

        #[test]
        fn prop_integer_within_bounds(lo in -1000i64..1000, span in 0i64..1000, seed in any::<u64>()) {
            let settings = RandomizeSettings::default().with_range(lo, lo + span);
            let raw = StdRandomizer::seeded(seed).generate(RandomKind::Integer, &settings).unwrap();
            let value = i64::from_raw(Some(&raw)).unwrap();
            prop_assert!(value >= lo && value <= lo + span);
        }
    }
}
