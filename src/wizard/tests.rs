//! Cycle-level tests driving the dispatcher through recording test doubles

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::*;

type Log = Arc<Mutex<Vec<String>>>;

const KEYS: [&str; 5] = ["first", "second", "third", "fourth", "fifth"];

#[derive(Debug, Clone, Default)]
struct Behavior {
    prereq: Option<PrereqMissing>,
    save_error: Option<String>,
    response_kind: Option<String>,
}

impl Behavior {
    fn blocked(missing: PrereqMissing) -> Self {
        Self {
            prereq: Some(missing),
            ..Self::default()
        }
    }

    fn failing_save(message: &str) -> Self {
        Self {
            save_error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// Step double that records every call into a shared log
struct MonitorStep {
    key: String,
    behavior: Behavior,
    log: Log,
}

impl MonitorStep {
    fn record(&self, call: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", call, self.key));
    }
}

impl WizardStep for MonitorStep {
    fn display(&self, _cx: &StepContext<'_>) -> ViewData {
        self.record("display");
        let mut data = ViewData::new();
        data.insert("title".into(), json!(self.key.to_uppercase()));
        data
    }

    fn save(&self, _cx: &StepContext<'_>) -> Result<(), SaveStepError> {
        self.record("save");
        match &self.behavior.save_error {
            Some(message) => Err(SaveStepError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn prereq(&self, _cx: &StepContext<'_>) -> Result<(), PrereqMissing> {
        self.record("prereq");
        self.behavior.prereq.clone().map_or(Ok(()), Err)
    }

    fn template(&self, _cx: &StepContext<'_>) -> StepTemplate {
        self.record("template");
        StepTemplate::inline("{{title}} {{step_number}}/{{total_steps}}")
    }

    fn response_kind(&self) -> Option<&str> {
        self.behavior.response_kind.as_deref()
    }
}

/// Records signals into the same log as the steps
struct Recorder {
    log: Log,
}

impl SignalHandler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn receive(&self, _wizard: &Wizard, event: &WizardEvent) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", event.signal.as_str(), event.step_key));
        Ok(())
    }
}

struct Failing;

impl SignalHandler for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn receive(&self, _wizard: &Wizard, _event: &WizardEvent) -> anyhow::Result<()> {
        anyhow::bail!("handler exploded")
    }
}

struct Harness {
    log: Log,
    messages: Arc<MessageLog>,
    definition: WizardDefinition,
}

fn monitored_steps(keys: &[&str], behaviors: &[(&str, Behavior)], log: &Log) -> Vec<StepDefinition> {
    keys.iter()
        .map(|key| {
            let behavior = behaviors
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, b)| b.clone())
                .unwrap_or_default();
            let log = log.clone();
            StepDefinition::factory(*key, move |init: &StepInit<'_>| {
                log.lock()
                    .unwrap()
                    .push(format!("construct:{}", init.key));
                Ok(MonitorStep {
                    key: init.key.to_string(),
                    behavior: behavior.clone(),
                    log: log.clone(),
                })
            })
        })
        .collect()
}

fn harness(behaviors: &[(&str, Behavior)]) -> Harness {
    harness_with(&KEYS, behaviors, |builder| builder)
}

fn harness_with(
    keys: &[&str],
    behaviors: &[(&str, Behavior)],
    configure: impl FnOnce(WizardBuilder) -> WizardBuilder,
) -> Harness {
    let log = Log::default();
    let messages = Arc::new(MessageLog::new());
    let urls = RouteTable::new()
        .route("wizard", "/wizard/{step}")
        .unwrap();

    let builder = WizardDefinition::builder(
        "wizard",
        StepSource::fixed(monitored_steps(keys, behaviors, &log)),
    )
    .urls(Arc::new(urls))
    .messages(messages.clone())
    .signal_handler(Arc::new(Recorder { log: log.clone() }));

    Harness {
        log,
        messages,
        definition: configure(builder).build().unwrap(),
    }
}

impl Harness {
    fn cycle(&self, request: WizardRequest, step: Option<&str>) -> Wizard {
        self.definition.cycle(request, step).unwrap()
    }

    fn handle(&self, request: WizardRequest, step: Option<&str>) -> Result<Outcome, WizardError> {
        self.cycle(request, step).handle()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn calls(&self, prefix: &str) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|entry| entry.starts_with(prefix))
            .collect()
    }

    fn message_texts(&self) -> Vec<String> {
        self.messages.messages().into_iter().map(|m| m.text).collect()
    }
}

fn redirect(step: &str) -> Outcome {
    Outcome::Redirect {
        step: step.to_string(),
    }
}

#[test]
fn test_no_step_redirects_to_first() {
    let h = harness(&[]);
    let outcome = h.handle(WizardRequest::fetch(), None).unwrap();

    assert_eq!(outcome, redirect("first"));
    assert!(h.calls("construct:").is_empty());
}

#[test]
fn test_fetch_renders_only_the_requested_step() {
    let h = harness(&[]);
    let wizard = h.cycle(WizardRequest::fetch(), Some("fourth"));
    let response = wizard.handle_request().unwrap();

    assert_eq!(
        response,
        WizardResponse::Page {
            step: "fourth".into(),
            body: "FOURTH 4/5".into(),
            content_type: "text/html; charset=utf-8".into(),
        }
    );
    assert_eq!(h.calls("construct:"), vec!["construct:fourth"]);
    assert_eq!(h.calls("display:"), vec!["display:fourth"]);
    assert_eq!(h.calls("template:"), vec!["template:fourth"]);
    for key in ["first", "second", "third", "fifth"] {
        assert!(!wizard.is_constructed(key), "{} was constructed", key);
    }
}

#[test]
fn test_fetch_fires_signals_in_order() {
    let h = harness(&[]);
    h.handle(WizardRequest::fetch(), Some("first")).unwrap();

    assert_eq!(
        h.log(),
        vec![
            "construct:first",
            "prereq:first",
            "wizard.prereq:first",
            "wizard.pre_display:first",
            "display:first",
            "wizard.post_display:first",
        ]
    );
}

#[test]
fn test_failed_save_renders_same_step_without_post_save() {
    let h = harness(&[("first", Behavior::failing_save("bad email"))]);
    let outcome = h
        .handle(WizardRequest::submit().with_action("wizard_continue"), Some("first"))
        .unwrap();

    assert!(matches!(outcome, Outcome::Render { ref step, .. } if step == "first"));
    assert_eq!(h.calls("save:"), vec!["save:first"]);
    assert_eq!(h.calls("display:"), vec!["display:first"]);
    assert_eq!(h.calls("wizard.pre_save:"), vec!["wizard.pre_save:first"]);
    assert!(h.calls("wizard.post_save:").is_empty());
}

#[test]
fn test_submit_with_continue_redirects_forward() {
    let navigation = NavigationConfig::new(vec![NavigationAction::new("continue", 1)]);
    let h = harness_with(&KEYS, &[], |b| b.navigation(navigation));
    let outcome = h
        .handle(WizardRequest::submit().with_action("continue"), Some("first"))
        .unwrap();

    assert_eq!(outcome, redirect("second"));
    assert_eq!(
        h.log(),
        vec![
            "construct:first",
            "wizard.pre_save:first",
            "save:first",
            "wizard.post_save:first",
            "construct:second",
            "prereq:second",
            "wizard.prereq:second",
        ]
    );
}

#[test]
fn test_submit_without_action_stays_on_step() {
    let h = harness(&[]);
    let outcome = h.handle(WizardRequest::submit(), Some("third")).unwrap();
    assert_eq!(outcome, redirect("third"));
}

#[test]
fn test_save_action_stays_on_step() {
    let h = harness(&[]);
    let outcome = h
        .handle(WizardRequest::submit().with_action("wizard_save"), Some("second"))
        .unwrap();
    assert_eq!(outcome, redirect("second"));
}

#[test]
fn test_chained_explicit_targets_redirect_once() {
    let h = harness(&[
        (
            "fourth",
            Behavior::blocked(PrereqMissing::redirect_to("third").with_message("fourth needs third")),
        ),
        (
            "third",
            Behavior::blocked(PrereqMissing::redirect_to("second").with_message("third needs second")),
        ),
    ]);
    let outcome = h.handle(WizardRequest::fetch(), Some("fourth")).unwrap();

    assert_eq!(outcome, redirect("second"));
    assert_eq!(
        h.message_texts(),
        vec!["fourth needs third", "third needs second"]
    );
    assert!(h
        .messages
        .messages()
        .iter()
        .all(|m| m.level == MessageLevel::Error));
    assert!(h.calls("display:").is_empty());
}

#[test]
fn test_blocked_chain_collapses_to_first() {
    let behaviors: Vec<(&str, Behavior)> = KEYS
        .windows(2)
        .map(|pair| (pair[1], Behavior::blocked(PrereqMissing::redirect_to(pair[0]))))
        .collect();
    let h = harness(&behaviors);

    let outcome = h.handle(WizardRequest::fetch(), Some("fifth")).unwrap();
    assert_eq!(outcome, redirect("first"));
}

#[test]
fn test_edge_bounce_terminates() {
    let keys = ["a", "b", "c"];
    let h = harness_with(&keys, &[("c", Behavior::blocked(PrereqMissing::new()))], |b| b);

    let outcome = h
        .handle(WizardRequest::fetch().with_action("wizard_next"), Some("c"))
        .unwrap();
    assert_eq!(outcome, redirect("b"));
}

#[test]
fn test_start_bounce_terminates() {
    let keys = ["a", "b", "c"];
    let h = harness_with(&keys, &[("a", Behavior::blocked(PrereqMissing::new()))], |b| b);

    let outcome = h
        .handle(WizardRequest::fetch().with_action("wizard_previous"), Some("b"))
        .unwrap();
    assert_eq!(outcome, redirect("b"));
}

#[test]
fn test_backward_walk_skips_blocked_step() {
    let h = harness(&[("third", Behavior::blocked(PrereqMissing::new()))]);
    let outcome = h
        .handle(WizardRequest::fetch().with_action("wizard_previous"), Some("fourth"))
        .unwrap();
    assert_eq!(outcome, redirect("second"));
}

#[test]
fn test_forward_walk_skips_blocked_step() {
    let h = harness(&[("second", Behavior::blocked(PrereqMissing::new()))]);
    let outcome = h
        .handle(WizardRequest::submit().with_action("wizard_continue"), Some("first"))
        .unwrap();
    assert_eq!(outcome, redirect("third"));
}

#[test]
fn test_post_save_navigation_respects_targets() {
    let h = harness(&[(
        "third",
        Behavior::blocked(PrereqMissing::redirect_to("first").with_message("start over")),
    )]);
    let outcome = h
        .handle(WizardRequest::submit().with_action("wizard_continue"), Some("second"))
        .unwrap();

    assert_eq!(outcome, redirect("first"));
    assert_eq!(h.message_texts(), vec!["start over"]);
}

#[test]
fn test_blocked_direct_request_without_target_fails() {
    let h = harness(&[("third", Behavior::blocked(PrereqMissing::new()))]);
    let err = h.handle(WizardRequest::fetch(), Some("third")).unwrap_err();
    assert!(matches!(err, WizardError::PrereqTargetMissing { ref step } if step == "third"));
}

#[test]
fn test_target_loop_is_detected() {
    let h = harness(&[
        ("second", Behavior::blocked(PrereqMissing::redirect_to("third"))),
        ("third", Behavior::blocked(PrereqMissing::redirect_to("second"))),
    ]);
    let err = h.handle(WizardRequest::fetch(), Some("second")).unwrap_err();
    assert!(matches!(err, WizardError::PrereqCycle { ref step } if step == "second"));
}

#[test]
fn test_unknown_step_is_not_found() {
    let h = harness(&[]);
    let err = h.handle(WizardRequest::fetch(), Some("sixth")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_unknown_prereq_target_is_not_found() {
    let h = harness(&[("second", Behavior::blocked(PrereqMissing::redirect_to("nowhere")))]);
    let err = h.handle(WizardRequest::fetch(), Some("second")).unwrap_err();
    assert!(matches!(err, WizardError::UnknownStep(ref key) if key == "nowhere"));
}

#[test]
fn test_redirect_response_builds_location() {
    let h = harness(&[]);
    let response = h
        .cycle(WizardRequest::submit().with_action("wizard_next"), Some("second"))
        .handle_request()
        .unwrap();

    assert_eq!(
        response,
        WizardResponse::Redirect {
            step: "third".into(),
            location: "/wizard/third".into(),
        }
    );
}

#[test]
fn test_response_kind_overrides_content_type() {
    let h = harness(&[(
        "first",
        Behavior {
            response_kind: Some("application/json".into()),
            ..Behavior::default()
        },
    )]);
    let response = h
        .cycle(WizardRequest::fetch(), Some("first"))
        .handle_request()
        .unwrap();

    assert!(matches!(
        response,
        WizardResponse::Page { ref content_type, .. } if content_type == "application/json"
    ));
}

#[test]
fn test_display_payload_includes_wizard_context() {
    let mut extra = ViewData::new();
    extra.insert("site".into(), json!("example"));
    let h = harness_with(&KEYS, &[], |b| b.extra_context(extra));

    let mut wizard = h.cycle(WizardRequest::fetch(), Some("second"));
    let mut per_cycle = ViewData::new();
    per_cycle.insert("user".into(), json!("sam"));
    wizard.extend_context(per_cycle);

    let data = wizard.display_payload("second").unwrap();
    assert_eq!(data["title"], json!("SECOND"));
    assert_eq!(data["site"], json!("example"));
    assert_eq!(data["user"], json!("sam"));
    assert_eq!(data["step_key"], json!("second"));
    assert_eq!(data["step_number"], json!(2));
    assert_eq!(data["total_steps"], json!(5));
    assert_eq!(data["wizard"]["current_step"], json!("second"));
    assert_eq!(data["wizard"]["steps"], json!(KEYS));
    assert_eq!(data["wizard"]["base_route"], json!("wizard"));
}

#[test]
fn test_next_and_prev_urls() {
    let h = harness(&[]);
    let wizard = h.cycle(WizardRequest::fetch(), Some("third"));

    assert_eq!(wizard.next_step_url().unwrap().as_deref(), Some("/wizard/fourth"));
    assert_eq!(wizard.prev_step_url().unwrap().as_deref(), Some("/wizard/second"));

    let first = h.cycle(WizardRequest::fetch(), Some("first"));
    assert_eq!(first.prev_step_url().unwrap(), None);

    let last = h.cycle(WizardRequest::fetch(), Some("fifth"));
    assert_eq!(last.next_step_url().unwrap(), None);
}

#[test]
fn test_move_step_returns_none_when_kept_in_place() {
    let h = harness(&[(
        "third",
        Behavior::blocked(PrereqMissing::redirect_to("second")),
    )]);
    let wizard = h.cycle(WizardRequest::fetch(), Some("second"));
    assert_eq!(wizard.move_step(1).unwrap(), None);
    assert_eq!(wizard.move_step(-1).unwrap().as_deref(), Some("first"));
}

#[test]
fn test_step_instances_are_shared_within_a_cycle() {
    let h = harness(&[]);
    let wizard = h.cycle(WizardRequest::fetch(), Some("second"));

    let current = wizard.current_step().unwrap().unwrap();
    let again = wizard.step("second").unwrap();
    assert!(Arc::ptr_eq(&current, &again));
    assert_eq!(h.calls("construct:"), vec!["construct:second"]);

    let steps = wizard.steps().unwrap();
    assert_eq!(steps.len(), 5);
    assert!(Arc::ptr_eq(&steps[1].1, &current));
    assert_eq!(h.calls("construct:").len(), 5);
}

#[test]
fn test_each_cycle_builds_new_instances() {
    let h = harness(&[]);
    let a = h.cycle(WizardRequest::fetch(), Some("first")).step("first").unwrap();
    let b = h.cycle(WizardRequest::fetch(), Some("first")).step("first").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_failing_signal_handler_is_ignored() {
    let h = harness_with(&KEYS, &[], |b| b.signal_handler(Arc::new(Failing)));
    let outcome = h
        .handle(WizardRequest::submit().with_action("wizard_next"), Some("first"))
        .unwrap();

    assert_eq!(outcome, redirect("second"));
    assert_eq!(h.calls("wizard.post_save:"), vec!["wizard.post_save:first"]);
}

#[test]
fn test_factories_receive_step_args() {
    struct Seen(StepArgs);

    impl WizardStep for Seen {
        fn display(&self, _cx: &StepContext<'_>) -> ViewData {
            let mut data = ViewData::new();
            data.insert("args".into(), json!(self.0.positional));
            data.insert("abc".into(), self.0.get("abc").cloned().unwrap_or_default());
            data
        }

        fn template(&self, _cx: &StepContext<'_>) -> StepTemplate {
            StepTemplate::inline("")
        }
    }

    let definition = WizardDefinition::builder(
        "wizard",
        StepSource::fixed(vec![StepDefinition::factory("only", |init: &StepInit<'_>| {
            Ok(Seen(init.args.clone()))
        })]),
    )
    .step_args(StepArgs::new().arg("asdf").arg(9999).kwarg("abc", 123))
    .build()
    .unwrap();

    let wizard = definition
        .cycle(WizardRequest::fetch(), Some("only"))
        .unwrap();
    let data = wizard.display_payload("only").unwrap();
    assert_eq!(data["args"], json!(["asdf", 9999]));
    assert_eq!(data["abc"], json!(123));
}

#[test]
fn test_factory_error_names_step() {
    let definition = WizardDefinition::builder(
        "wizard",
        StepSource::fixed(vec![StepDefinition::factory(
            "broken",
            |_init: &StepInit<'_>| -> anyhow::Result<MonitorStep> { anyhow::bail!("no database") },
        )]),
    )
    .build()
    .unwrap();

    let err = definition
        .handle_request(WizardRequest::fetch(), Some("broken"))
        .unwrap_err();
    assert!(matches!(err, WizardError::StepConstruction { ref key, .. } if key == "broken"));
}

#[test]
fn test_dynamic_steps_follow_request() {
    let log = Log::default();
    let source_log = log.clone();
    let definition = WizardDefinition::builder(
        "wizard",
        StepSource::dynamic(move |request| {
            let keys: &[&str] = if request.has_param("short") {
                &["first", "fifth"]
            } else {
                &KEYS
            };
            monitored_steps(keys, &[], &source_log)
        }),
    )
    .build()
    .unwrap();

    let short = definition
        .cycle(WizardRequest::fetch().with_param("short", "1"), Some("first"))
        .unwrap();
    assert_eq!(short.total_steps(), 2);
    assert_eq!(short.move_step(1).unwrap().as_deref(), Some("fifth"));

    let full = definition
        .cycle(WizardRequest::fetch(), Some("first"))
        .unwrap();
    assert_eq!(full.total_steps(), 5);
}

#[test]
fn test_default_route_and_positional_redirect_args() {
    let log = Log::default();
    let default_route = WizardDefinition::builder(
        "wizard",
        StepSource::fixed(monitored_steps(&KEYS, &[], &log)),
    )
    .build()
    .unwrap();
    let response = default_route
        .handle_request(WizardRequest::fetch(), None)
        .unwrap();
    assert_eq!(response.location(), Some("/wizard/first"));

    let urls = RouteTable::new().route("nested", "/orgs/{}/{}").unwrap();
    let positional = WizardDefinition::builder(
        "nested",
        StepSource::fixed(monitored_steps(&KEYS, &[], &log)),
    )
    .urls(Arc::new(urls))
    .redirect_args(RedirectArgs::positional(["acme"]))
    .build()
    .unwrap();
    let response = positional
        .handle_request(WizardRequest::fetch(), None)
        .unwrap();
    assert_eq!(response.location(), Some("/orgs/acme/first"));
}

#[test]
fn test_default_route_with_empty_base_stays_on_host() {
    let log = Log::default();
    for base in ["", "/"] {
        let definition =
            WizardDefinition::builder(base, StepSource::fixed(monitored_steps(&KEYS, &[], &log)))
                .build()
                .unwrap();
        let response = definition
            .handle_request(WizardRequest::fetch(), None)
            .unwrap();
        assert_eq!(response.location(), Some("/first"), "base {:?}", base);
    }
}

#[test]
fn test_url_errors_propagate() {
    let h = harness_with(&KEYS, &[], |b| {
        b.redirect_args(RedirectArgs::keyword([("unexpected", "x")]))
    });
    let err = h
        .cycle(WizardRequest::fetch(), None)
        .handle_request()
        .unwrap_err();
    assert!(matches!(err, WizardError::Url(UrlError::NoReverseMatch { .. })));
}

#[test]
fn test_empty_and_duplicate_step_lists_are_rejected() {
    let empty = WizardDefinition::builder("wizard", StepSource::fixed(Vec::new()))
        .build()
        .unwrap();
    assert!(matches!(
        empty.cycle(WizardRequest::fetch(), None).unwrap_err(),
        WizardError::EmptyWizard
    ));

    let log = Log::default();
    let duplicate = WizardDefinition::builder(
        "wizard",
        StepSource::fixed(monitored_steps(&["first", "first"], &[], &log)),
    )
    .build()
    .unwrap();
    assert!(matches!(
        duplicate.cycle(WizardRequest::fetch(), None).unwrap_err(),
        WizardError::DuplicateStep(ref key) if key == "first"
    ));
}

#[test]
fn test_definition_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<WizardDefinition>();

    let h = harness(&[]);
    let definition = h.definition.clone();
    let outcome = std::thread::spawn(move || {
        definition
            .cycle(WizardRequest::fetch(), Some("third"))
            .and_then(|wizard| wizard.handle())
            .map(|outcome| outcome.step().to_string())
    })
    .join()
    .unwrap()
    .unwrap();
    assert_eq!(outcome, "third");
}
