//! End-to-end tests for page objects over the mock driver.
//!
//! Each test builds a small document, declares components against it and
//! drives them through the public API only.

use pagescope::mock::{MockDom, MockDriver, MockElement};
use pagescope::prelude::*;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Greeting paragraph inside a header, with a virtual clock
fn greeting_page(text: &str) -> (PageObject, MockDriver, Rc<ManualClock>, ComponentId) {
    let clock = Rc::new(ManualClock::new());
    let (page, driver, greeting) = greeting_page_with(PageConfig::default(), Rc::clone(&clock), text);
    (page, driver, clock, greeting)
}

fn greeting_page_with(
    config: PageConfig,
    clock: impl Clock + 'static,
    text: &str,
) -> (PageObject, MockDriver, ComponentId) {
    let mut dom = MockDom::new();
    let header = dom.append(dom.root(), MockElement::new("header").id("top"));
    let _ = dom.append(header, MockElement::new("p").id("hello").class("greeting").text(text));
    let driver = MockDriver::new(dom);
    let mut page = PageObject::builder("Home", driver.clone())
        .config(config)
        .clock(clock)
        .build();
    let header = page
        .add_component(page.root(), ComponentSpec::new("Header", "Section").find(FindBy::id("top")))
        .unwrap();
    let greeting = page
        .add_component(header, ComponentSpec::new("Greeting", "Text").find(FindBy::class("greeting")))
        .unwrap();
    (page, driver, greeting)
}

/// Replace `header#top` with a fresh header holding `text`
fn replace_header(driver: &MockDriver, text: &str) {
    let mut dom = driver.dom_mut();
    if let Some(old) = dom.find_by_id("top") {
        dom.remove(old);
    }
    let root = dom.root();
    let header = dom.append(root, MockElement::new("header").id("top"));
    let _ = dom.append(header, MockElement::new("p").id("hello").class("greeting").text(text));
}

/// Virtual clock that re-attaches the header on the n-th sleep
#[derive(Debug)]
struct ReattachingClock {
    inner: ManualClock,
    driver: MockDriver,
    at_sleep: usize,
    text: &'static str,
}

impl Clock for ReattachingClock {
    fn now(&self) -> std::time::Instant {
        self.inner.now()
    }

    fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration);
        if self.inner.sleep_count() == self.at_sleep {
            replace_header(&self.driver, self.text);
        }
    }
}

/// Trigger behavior that runs a closure-free action and records it
#[derive(Debug)]
struct Spy {
    label: &'static str,
    action: SpyAction,
    seen: Rc<RefCell<Vec<String>>>,
}

#[derive(Debug, Clone, Copy)]
enum SpyAction {
    Record,
    ReadValue,
    Fail,
}

impl TriggerBehavior for Spy {
    fn execute(&self, ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        match self.action {
            SpyAction::Record => {
                self.seen.borrow_mut().push(self.label.to_string());
                Ok(())
            }
            SpyAction::ReadValue => {
                let value = ctx.page.attribute(ctx.component, "value")?.unwrap_or_default();
                self.seen.borrow_mut().push(format!("{}={value}", self.label));
                Ok(())
            }
            SpyAction::Fail => Err(PageError::driver("spy failed")),
        }
    }

    fn name(&self) -> String {
        self.label.to_string()
    }
}

fn spy(
    label: &'static str,
    action: SpyAction,
    seen: &Rc<RefCell<Vec<String>>>,
    events: TriggerEvents,
) -> TriggerAttribute {
    TriggerAttribute::new(
        events,
        Spy {
            label,
            action,
            seen: Rc::clone(seen),
        },
    )
}

// ============================================================================
// Verification timing
// ============================================================================

#[test]
fn satisfied_verification_never_sleeps_for_any_match_kind() {
    for kind in MatchKind::CONCRETE {
        for negated in [false, true] {
            let (mut page, _, clock, greeting) = greeting_page("Hello");
            let expected = if negated { "zzz" } else { "Hello" };
            let request = VerificationRequest::value(greeting, kind, [expected]).negated(negated);
            let pass = page.verify(request).unwrap().into_result().unwrap();
            assert_eq!(pass.attempts, 1, "{kind:?} negated={negated}");
            assert_eq!(clock.sleep_count(), 0, "{kind:?} negated={negated}");

            let request = VerificationRequest::condition(Condition::custom("hold", move |_| Ok(!negated)))
                .negated(negated);
            assert!(page.verify(request).unwrap().is_passed());
            assert_eq!(clock.sleep_count(), 0);
        }
    }
}

#[test]
fn greeting_matches_any_of_expected_values() {
    let (mut page, _, clock, greeting) = greeting_page("Hi");
    let pass = page
        .verify(VerificationRequest::value(greeting, MatchKind::Equals, ["Hello", "Hi"]))
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(pass.attempts, 1);
    assert_eq!(clock.sleep_count(), 0);
}

#[test]
fn greeting_mismatch_times_out_with_last_actual() {
    let (mut page, _, clock, greeting) = greeting_page("Bye");
    let outcome = page
        .verify(
            VerificationRequest::value(greeting, MatchKind::Equals, ["Hello", "Hi"])
                .within(ms(500))
                .polling(ms(100)),
        )
        .unwrap();
    let VerificationOutcome::Failed(failure) = outcome else {
        panic!("expected a timeout");
    };
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.actual.as_deref(), Some("Bye"));
    assert_eq!(failure.match_kind, Some(MatchKind::Equals));
    assert!(!failure.negated);
    assert!(clock.elapsed() >= ms(500));
    assert!(clock.elapsed() <= ms(600));
}

proptest! {
    #[test]
    fn never_true_condition_fails_within_timeout_window(
        timeout_ms in 1u64..3_000,
        poll_ms in 1u64..400,
    ) {
        let (mut page, _, clock, _) = greeting_page("Bye");
        let outcome = page
            .verify(
                VerificationRequest::condition(Condition::custom("never", |_| Ok(false)))
                    .within(ms(timeout_ms))
                    .polling(ms(poll_ms)),
            )
            .unwrap();
        prop_assert!(!outcome.is_passed());
        prop_assert!(clock.elapsed() >= ms(timeout_ms));
        prop_assert!(clock.elapsed() <= ms(timeout_ms + poll_ms));
    }
}

#[test]
fn cancellation_stops_at_next_poll_boundary() {
    let (mut page, _, clock, greeting) = greeting_page("Bye");
    let token = page.cancellation().clone();
    let canceller = token.clone();
    let _ = page
        .add_trigger(
            greeting,
            TriggerAttribute::new(TriggerEvents::BEFORE_GET, Canceller { token: canceller }),
        )
        .unwrap();
    let outcome = page
        .verify(
            VerificationRequest::value(greeting, MatchKind::Equals, ["Hello"])
                .within(ms(10_000))
                .polling(ms(250)),
        )
        .unwrap();
    let VerificationOutcome::Failed(failure) = outcome else {
        panic!("expected cancellation");
    };
    assert!(token.is_cancelled());
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.attempts, 1);
    assert_eq!(clock.elapsed(), ms(250));
    assert!(failure.to_string().contains("cancelled"));
}

#[derive(Debug)]
struct Canceller {
    token: CancellationToken,
}

impl TriggerBehavior for Canceller {
    fn execute(&self, _ctx: &mut TriggerContext<'_>) -> PageResult<()> {
        self.token.cancel();
        Ok(())
    }

    fn name(&self) -> String {
        "cancel".into()
    }
}

// ============================================================================
// Scope resolution
// ============================================================================

#[test]
fn invalidating_parent_forces_descendant_relocation() {
    let (mut page, driver, _, greeting) = greeting_page("Hello");
    let header = page.component(greeting).unwrap().parent().unwrap();
    let before = page.scope(greeting).unwrap();

    let calls = driver.find_calls();
    let _ = page.scope(greeting).unwrap();
    assert_eq!(driver.find_calls(), calls);

    page.invalidate(header).unwrap();
    let after = page.scope(greeting).unwrap();
    assert_eq!(driver.find_calls(), calls + 2);
    assert_eq!(before, after);
    let cached = page.component(greeting).unwrap().cached_scope().unwrap();
    assert_eq!(cached.parent_stamp, page.component(header).unwrap().cached_scope().unwrap().stamp);
}

#[test]
fn invalidating_page_relocates_whole_tree() {
    let (mut page, driver, _, greeting) = greeting_page("Hello");
    let _ = page.scope(greeting).unwrap();
    let calls = driver.find_calls();
    let root = page.root();
    page.invalidate(root).unwrap();
    let _ = page.scope(greeting).unwrap();
    assert_eq!(driver.find_calls(), calls + 2);
}

#[test]
fn missing_element_raises_scope_not_found() {
    let (mut page, _, _, _) = greeting_page("Hello");
    let root = page.root();
    let banner = page
        .add_component(root, ComponentSpec::new("Banner", "Text").find(FindBy::id("banner")))
        .unwrap();
    for err in [
        page.content(banner).unwrap_err(),
        page.click(banner).unwrap_err(),
        page.field::<String>(banner).get().unwrap_err(),
    ] {
        assert!(matches!(err, PageError::ScopeNotFound { .. }), "{err}");
    }
    assert!(!page.exists(banner).unwrap());
}

#[test]
fn replaced_element_is_relocated_once() {
    let (mut page, driver, _, greeting) = greeting_page("Hello");
    assert_eq!(page.content(greeting).unwrap(), "Hello");

    let old = driver.dom().find_by_id("hello").unwrap();
    let header = driver.dom().find_by_id("top").unwrap();
    driver.dom_mut().remove(old);
    let _ = driver
        .dom_mut()
        .append(header, MockElement::new("p").id("hello").class("greeting").text("Welcome back"));

    assert_eq!(page.content(greeting).unwrap(), "Welcome back");
}

#[test]
fn verification_recovers_from_replaced_ancestor() {
    for stale_retry in [true, false] {
        let config = PageConfig::default().with_stale_retry(stale_retry);
        let (mut page, driver, greeting) = greeting_page_with(config, ManualClock::new(), "Hi");
        assert_eq!(page.content(greeting).unwrap(), "Hi");

        replace_header(&driver, "Hello");

        let pass = page
            .verify(
                VerificationRequest::value(greeting, MatchKind::Equals, ["Hello"])
                    .within(ms(500))
                    .polling(ms(100)),
            )
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(pass.actual.as_deref(), Some("Hello"), "stale_retry={stale_retry}");
        assert_eq!(pass.attempts, 1, "stale_retry={stale_retry}");
    }
}

#[test]
fn verification_waits_for_detached_ancestor_to_return() {
    for stale_retry in [true, false] {
        let config = PageConfig::default().with_stale_retry(stale_retry);
        let mut dom = MockDom::new();
        let header = dom.append(dom.root(), MockElement::new("header").id("top"));
        let _ = dom.append(header, MockElement::new("p").class("greeting").text("Hi"));
        let driver = MockDriver::new(dom);
        let clock = Rc::new(ReattachingClock {
            inner: ManualClock::new(),
            driver: driver.clone(),
            at_sleep: 2,
            text: "Hello",
        });
        let mut page = PageObject::builder("Home", driver.clone())
            .config(config)
            .clock(Rc::clone(&clock))
            .build();
        let header = page
            .add_component(page.root(), ComponentSpec::new("Header", "Section").find(FindBy::id("top")))
            .unwrap();
        let greeting = page
            .add_component(header, ComponentSpec::new("Greeting", "Text").find(FindBy::class("greeting")))
            .unwrap();
        assert_eq!(page.content(greeting).unwrap(), "Hi");

        let old = driver.dom().find_by_id("top").unwrap();
        driver.dom_mut().remove(old);

        let pass = page
            .verify(
                VerificationRequest::value(greeting, MatchKind::Equals, ["Hello"])
                    .within(ms(500))
                    .polling(ms(100)),
            )
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(pass.attempts, 3, "stale_retry={stale_retry}");
        assert_eq!(pass.elapsed, ms(200), "stale_retry={stale_retry}");
        assert_eq!(clock.inner.sleep_count(), 2);
    }
}

#[test]
fn index_locator_picks_nth_tagged_element() {
    let mut dom = MockDom::new();
    let list = dom.append(dom.root(), MockElement::new("ul").id("items"));
    for label in ["alpha", "beta", "gamma"] {
        let _ = dom.append(list, MockElement::new("li").text(label));
    }
    let mut page = PageObject::builder("List", MockDriver::new(dom))
        .clock(ManualClock::new())
        .build();
    let items = page
        .add_component(page.root(), ComponentSpec::new("Items", "List").find(FindBy::id("items")))
        .unwrap();
    let second = page
        .add_component(items, ComponentSpec::new("Second", "Item").tag("li").find(FindBy::index(2)))
        .unwrap();
    assert_eq!(page.content(second).unwrap(), "beta");
}

#[test]
fn custom_strategy_is_bound_by_kind() {
    #[derive(Debug)]
    struct AriaLabel;

    impl ScopeLocateStrategy for AriaLabel {
        fn locate(
            &self,
            driver: &dyn Driver,
            metadata: &ComponentMetadata,
            context: &SearchContext,
            _filter: &ScopeFilter,
        ) -> PageResult<Vec<ElementHandle>> {
            let tagged = driver.find_elements(context, &LocatorSpec::css(metadata.locator.tag_selector()))?;
            let mut found = Vec::new();
            for handle in tagged {
                if let Some(label) = driver.read_attribute(&handle, "aria-label")? {
                    if metadata.locator.terms.iter().any(|t| *t == label) {
                        found.push(handle);
                    }
                }
            }
            Ok(found)
        }

        fn name(&self) -> &str {
            "aria label"
        }
    }

    let mut dom = MockDom::new();
    let _ = dom.append(dom.root(), MockElement::new("button").attr("aria-label", "Open").text("+"));
    let _ = dom.append(dom.root(), MockElement::new("button").attr("aria-label", "Close").text("x"));
    let mut page = PageObject::builder("Dialog", MockDriver::new(dom))
        .strategy(LocatorKind::Custom("aria".into()), AriaLabel)
        .clock(ManualClock::new())
        .build();
    let close = page
        .add_component(
            page.root(),
            ComponentSpec::new("Close", "Button")
                .tag("button")
                .find(FindBy::custom("aria").with_values(["Close"])),
        )
        .unwrap();
    assert_eq!(page.content(close).unwrap(), "x");
    assert_eq!(page.component(close).unwrap().cached_scope().unwrap().strategy, "aria label");
}

// ============================================================================
// Triggers
// ============================================================================

#[test]
fn triggers_fire_by_priority_then_declaration() {
    let (mut page, _, _, greeting) = greeting_page("Hello");
    let seen = Rc::new(RefCell::new(Vec::new()));
    for (label, priority) in [("p2", 2), ("p1a", 1), ("p1b", 1), ("p3", 3)] {
        let _ = page
            .add_trigger(
                greeting,
                spy(label, SpyAction::Record, &seen, TriggerEvents::BEFORE_CLICK)
                    .with_priority(Priority(priority)),
            )
            .unwrap();
    }
    page.click(greeting).unwrap();
    assert_eq!(*seen.borrow(), vec!["p1a", "p1b", "p2", "p3"]);
}

#[test]
fn set_is_bracketed_by_before_and_after_set() {
    let mut dom = MockDom::new();
    let form = dom.append(dom.root(), MockElement::new("form").id("signup"));
    let _ = dom.append(form, MockElement::new("input").name("nickname"));
    let driver = MockDriver::new(dom);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut page = PageObject::builder("Sign Up", driver.clone())
        .clock(ManualClock::new())
        .build();
    let form = page
        .add_component(page.root(), ComponentSpec::new("Sign Up", "Form").find(FindBy::id("signup")))
        .unwrap();
    let nickname = page
        .add_component(
            form,
            ComponentSpec::new("Nickname", "TextInput")
                .find(FindBy::name("nickname"))
                .source(DataSource::Value)
                .trigger(TriggerAttribute::new(TriggerEvents::BEFORE_SET, ScrollIntoView))
                .trigger(spy("after", SpyAction::ReadValue, &seen, TriggerEvents::AFTER_SET)),
        )
        .unwrap();

    page.editable::<String>(nickname).set("abc").unwrap();

    assert_eq!(*seen.borrow(), vec!["after=abc"]);
    let index = driver.dom().find_by_id("signup").map(|f| f + 1).unwrap();
    assert_eq!(
        driver.journal(),
        vec![format!("scroll_into_view e{index}"), format!("set_value e{index} abc")]
    );
}

#[test]
fn failing_before_trigger_aborts_the_operation() {
    let (mut page, driver, _, greeting) = greeting_page("Hello");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _ = page
        .add_trigger(greeting, spy("guard", SpyAction::Fail, &seen, TriggerEvents::BEFORE_CLICK))
        .unwrap();
    let err = page.click(greeting).unwrap_err();
    match err {
        PageError::TriggerFailure { trigger, event, component, .. } => {
            assert_eq!(trigger, "guard");
            assert_eq!(event, TriggerEvent::BeforeClick);
            assert_eq!(component, "\"Greeting\" text");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(driver.journal().is_empty());
}

#[test]
fn heading_check_guards_page_init() {
    let mut dom = MockDom::new();
    let _ = dom.append(dom.root(), MockElement::new("h1").text("Dashboard"));
    let clock = Rc::new(ManualClock::new());
    let mut page = PageObject::builder("Dashboard", MockDriver::new(dom.clone()))
        .config(PageConfig::default().with_verify_timeout(400).with_poll_interval(100))
        .clock(Rc::clone(&clock))
        .trigger(TriggerAttribute::new(TriggerEvents::INIT, VerifyHeading::h1()))
        .build();
    page.init().unwrap();
    assert_eq!(clock.sleep_count(), 0);
    let headings = page.children(page.root()).unwrap().to_vec();
    assert_eq!(headings.len(), 1);
    assert_eq!(page.metadata(headings[0]).unwrap().name, "Dashboard");

    let mut wrong = PageObject::builder("Settings", MockDriver::new(dom))
        .config(PageConfig::default().with_verify_timeout(400).with_poll_interval(100))
        .clock(Rc::clone(&clock))
        .trigger(TriggerAttribute::new(TriggerEvents::INIT, VerifyHeading::h1()))
        .build();
    let err = wrong.init().unwrap_err();
    let PageError::TriggerFailure { source, .. } = err else {
        panic!("expected trigger failure");
    };
    let PageError::Verification(failure) = *source else {
        panic!("expected verification failure");
    };
    assert_eq!(failure.actual.as_deref(), Some("Dashboard"));
    assert_eq!(failure.expected, vec!["Settings"]);
    assert!(!wrong.is_initialized());
}

#[test]
fn late_component_with_failing_init_is_detached() {
    let (mut page, _, _, greeting) = greeting_page("Hello");
    page.init().unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let header = page.component(greeting).unwrap().parent().unwrap();
    let err = page
        .add_component(
            header,
            ComponentSpec::new("Broken", "Text")
                .find(FindBy::class("greeting"))
                .trigger(spy("boom", SpyAction::Fail, &seen, TriggerEvents::INIT)),
        )
        .unwrap_err();
    assert!(matches!(err, PageError::TriggerFailure { .. }));
    assert_eq!(page.children(header).unwrap(), &[greeting]);
}

// ============================================================================
// Data
// ============================================================================

#[derive(Debug)]
struct FixedRandomizer(&'static str);

impl Randomizer for FixedRandomizer {
    fn generate(&mut self, _kind: RandomKind, _settings: &RandomizeSettings) -> PageResult<String> {
        Ok(self.0.to_string())
    }
}

#[test]
fn set_random_then_get_round_trips() {
    let mut dom = MockDom::new();
    let _ = dom.append(dom.root(), MockElement::new("input").id("age"));
    let mut page = PageObject::builder("Profile", MockDriver::new(dom))
        .randomizer(FixedRandomizer("37"))
        .clock(ManualClock::new())
        .build();
    let age = page
        .add_component(
            page.root(),
            ComponentSpec::new("Age", "NumberInput")
                .find(FindBy::id("age"))
                .source(DataSource::Value),
        )
        .unwrap();
    let mut field = page.editable::<i64>(age);
    let written = field.set_random().unwrap();
    assert_eq!(written, 37);
    assert_eq!(field.get().unwrap(), written);
}

#[test]
fn unconvertible_value_is_a_conversion_error() {
    let (mut page, _, _, greeting) = greeting_page("Hello");
    let err = page.field::<i64>(greeting).get().unwrap_err();
    assert!(matches!(err, PageError::Conversion { target: "integer", .. }));
}

#[test]
fn writes_are_logged_as_data_setting_sections() {
    let mut dom = MockDom::new();
    let _ = dom.append(dom.root(), MockElement::new("input").id("city"));
    let log = RecordingLogSink::new();
    let mut page = PageObject::builder("Address", MockDriver::new(dom))
        .log_sink(log.clone())
        .clock(ManualClock::new())
        .build();
    let city = page
        .add_component(
            page.root(),
            ComponentSpec::new("City", "TextInput")
                .find(FindBy::id("city"))
                .source(DataSource::Value),
        )
        .unwrap();
    let _ = page
        .editable::<String>(city)
        .set("Lisbon")
        .unwrap()
        .should()
        .equal("Lisbon")
        .unwrap();
    assert_eq!(
        log.entries(),
        vec![
            LogEntry::Start(LogSection::DataSetting {
                component: "\"City\" text input".into(),
                value: "\"Lisbon\"".into(),
            }),
            LogEntry::End,
        ]
    );
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn yaml_config_drives_verification_timing() {
    let config = PageConfig::from_yaml_str(
        "verify_timeout_ms: 300\nverify_poll_interval_ms: 150\nmultiple_match: strict\n",
    )
    .unwrap();
    let (_, driver, _, _) = greeting_page("Bye");
    let clock = Rc::new(ManualClock::new());
    let mut page = PageObject::builder("Home", driver)
        .config(config)
        .clock(Rc::clone(&clock))
        .build();
    let greeting = page
        .add_component(page.root(), ComponentSpec::new("Greeting", "Text").find(FindBy::class("greeting")))
        .unwrap();
    let err = page.should(greeting).equal("Hello").unwrap_err();
    let PageError::Verification(failure) = err else {
        panic!("expected verification failure");
    };
    assert_eq!(failure.timeout, ms(300));
    assert_eq!(failure.attempts, 3);
    assert_eq!(clock.elapsed(), ms(300));
}
