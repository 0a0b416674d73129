//! Folding over every event reachable from a scene.
//!
//! Walks descend into all named branches of an event and inline custom event
//! bodies (with their bound arguments substituted) up to a fixed depth.
//! Disabled events are skipped together with their children.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::project::{Actor, CustomEvent, Scene, ScriptEvent, Trigger, commands};

pub type CustomEventLookup<'a> = HashMap<&'a str, &'a CustomEvent>;

pub fn custom_event_lookup(scripts: &[CustomEvent]) -> CustomEventLookup<'_> {
    scripts.iter().map(|s| (s.id.as_str(), s)).collect()
}

#[derive(Clone, Copy)]
pub struct WalkOptions<'a> {
    pub custom_events: &'a CustomEventLookup<'a>,
    pub max_depth: usize,
}

/// Where an event was found.
#[derive(Clone, Copy)]
pub struct EventSite<'a> {
    pub scene: Option<&'a Scene>,
    pub actor: Option<&'a Actor>,
    pub trigger: Option<&'a Trigger>,
    /// Custom event nesting depth, 0 for events written directly on the entity.
    pub depth: usize,
}

impl<'a> EventSite<'a> {
    pub fn detached() -> Self {
        EventSite {
            scene: None,
            actor: None,
            trigger: None,
            depth: 0,
        }
    }

    fn scene(scene: &'a Scene) -> Self {
        EventSite {
            scene: Some(scene),
            ..Self::detached()
        }
    }
}

/// Accumulates a result over visited events.
pub trait ScriptFolder<A> {
    fn fold_event(&mut self, acc: A, event: &ScriptEvent, site: &EventSite<'_>) -> A;
}

impl<A, F> ScriptFolder<A> for F
where
    F: FnMut(A, &ScriptEvent, &EventSite<'_>) -> A,
{
    fn fold_event(&mut self, acc: A, event: &ScriptEvent, site: &EventSite<'_>) -> A {
        self(acc, event, site)
    }
}

pub fn fold_events<A, F: ScriptFolder<A>>(
    events: &[ScriptEvent],
    site: EventSite<'_>,
    options: WalkOptions<'_>,
    acc: A,
    folder: &mut F,
) -> A {
    events
        .iter()
        .fold(acc, |acc, event| fold_event(event, site, options, acc, folder))
}

fn fold_event<A, F: ScriptFolder<A>>(
    event: &ScriptEvent,
    site: EventSite<'_>,
    options: WalkOptions<'_>,
    acc: A,
    folder: &mut F,
) -> A {
    if event.is_comment() {
        return acc;
    }
    let mut acc = folder.fold_event(acc, event, &site);
    for branch in event.children.values() {
        acc = fold_events(branch, site, options, acc, folder);
    }
    if event.command == commands::EVENT_CALL_CUSTOM_EVENT && site.depth < options.max_depth {
        let custom = event
            .arg_str("customEventId")
            .and_then(|id| options.custom_events.get(id));
        if let Some(custom) = custom {
            let body = bind_custom_event_args(&custom.script, &event.args);
            let inner = EventSite {
                depth: site.depth + 1,
                ..site
            };
            acc = fold_events(&body, inner, options, acc, folder);
        }
    }
    acc
}

/// Folds every script of a scene: scene slots, then actors, then triggers.
pub fn fold_scene<A, F: ScriptFolder<A>>(
    scene: &Scene,
    options: WalkOptions<'_>,
    acc: A,
    folder: &mut F,
) -> A {
    let site = EventSite::scene(scene);
    let mut acc = scene
        .scripts()
        .into_iter()
        .fold(acc, |acc, (_, script)| {
            fold_events(script, site, options, acc, folder)
        });
    for actor in &scene.actors {
        let site = EventSite {
            actor: Some(actor),
            ..site
        };
        for (_, script) in actor.scripts() {
            acc = fold_events(script, site, options, acc, folder);
        }
    }
    for trigger in &scene.triggers {
        let site = EventSite {
            trigger: Some(trigger),
            ..site
        };
        for (_, script) in trigger.scripts() {
            acc = fold_events(script, site, options, acc, folder);
        }
    }
    acc
}

pub fn fold_scenes<A, F: ScriptFolder<A>>(
    scenes: &[Scene],
    options: WalkOptions<'_>,
    acc: A,
    folder: &mut F,
) -> A {
    scenes
        .iter()
        .fold(acc, |acc, scene| fold_scene(scene, options, acc, folder))
}

/// Arguments a call site passes into a custom event body.
pub fn bound_args(call_args: &Map<String, Value>) -> Map<String, Value> {
    call_args
        .iter()
        .filter(|(key, _)| key.as_str() != "customEventId" && !key.starts_with("__"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Copies a custom event body with every `$name$` argument replaced by the
/// value bound at the call site.
pub fn bind_custom_event_args(
    script: &[ScriptEvent],
    call_args: &Map<String, Value>,
) -> Vec<ScriptEvent> {
    script
        .iter()
        .map(|event| ScriptEvent {
            id: event.id.clone(),
            command: event.command.clone(),
            args: event
                .args
                .iter()
                .map(|(key, value)| (key.clone(), substitute(value, call_args)))
                .collect(),
            children: event
                .children
                .iter()
                .map(|(name, branch)| (name.clone(), bind_custom_event_args(branch, call_args)))
                .collect(),
        })
        .collect()
}

fn substitute(value: &Value, call_args: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) if s.len() > 2 && s.starts_with('$') && s.ends_with('$') => {
            let name = &s[1..s.len() - 1];
            match call_args.get(name) {
                Some(bound) if name != "customEventId" => bound.clone(),
                _ => value.clone(),
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, call_args)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, call_args)).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MAX_NESTED_SCRIPT_DEPTH;

    fn commands_in(scene: &Scene, scripts: &[CustomEvent]) -> Vec<String> {
        let lookup = custom_event_lookup(scripts);
        let options = WalkOptions {
            custom_events: &lookup,
            max_depth: MAX_NESTED_SCRIPT_DEPTH,
        };
        fold_scene(
            scene,
            options,
            Vec::new(),
            &mut |mut acc: Vec<String>, event: &ScriptEvent, _: &EventSite<'_>| {
                acc.push(event.command.clone());
                acc
            },
        )
    }

    #[test]
    fn visits_branches_and_skips_comments() {
        let scene = Scene {
            script: vec![
                ScriptEvent::new("EVENT_IF_TRUE")
                    .with_branch("true", vec![ScriptEvent::new("EVENT_A")])
                    .with_branch("false", vec![ScriptEvent::new("EVENT_B")]),
                ScriptEvent::new("EVENT_C")
                    .with_arg("__comment", true)
                    .with_branch("true", vec![ScriptEvent::new("EVENT_D")]),
            ],
            ..Default::default()
        };
        let seen = commands_in(&scene, &[]);
        assert_eq!(seen, vec!["EVENT_IF_TRUE", "EVENT_B", "EVENT_A"]);
    }

    #[test]
    fn recursive_custom_events_stop_at_max_depth() {
        let custom = CustomEvent {
            id: "loop".into(),
            script: vec![
                ScriptEvent::new("EVENT_TICK"),
                ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT).with_arg("customEventId", "loop"),
            ],
            ..Default::default()
        };
        let scene = Scene {
            script: vec![
                ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT).with_arg("customEventId", "loop"),
            ],
            ..Default::default()
        };
        let seen = commands_in(&scene, &[custom]);
        let ticks = seen.iter().filter(|c| *c == "EVENT_TICK").count();
        assert_eq!(ticks, MAX_NESTED_SCRIPT_DEPTH);
    }

    #[test]
    fn binds_arguments_inside_nested_values() {
        let body = vec![
            ScriptEvent::new("EVENT_ACTOR_SET_SPRITE")
                .with_arg("spriteSheetId", "$sprite$")
                .with_arg("value", serde_json::json!({"type": "variable", "value": "$V0$"})),
        ];
        let call = ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT)
            .with_arg("customEventId", "c")
            .with_arg("sprite", "hero")
            .with_arg("V0", "12");
        let bound = bind_custom_event_args(&body, &call.args);
        assert_eq!(bound[0].arg_str("spriteSheetId"), Some("hero"));
        assert_eq!(bound[0].args["value"]["value"], "12");
        assert!(!bound_args(&call.args).contains_key("customEventId"));
    }
}
