use crate::platform::MAX_NESTED_SCRIPT_DEPTH;
use crate::project::{ScriptEvent, commands};
use crate::schema::EventSchema;
use crate::walk::{CustomEventLookup, bind_custom_event_args};

/// Where a scene's automatic fade-in goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadePoint {
    /// The script fades in by itself.
    Manual,
    /// Insert before the top-level event at this index.
    Before(usize),
    /// Append after the last event.
    Append,
}

enum Found {
    Manual,
    Wait,
}

fn scan(
    events: &[ScriptEvent],
    schema: &EventSchema,
    custom_events: &CustomEventLookup<'_>,
    depth: usize,
) -> Option<Found> {
    events
        .iter()
        .filter(|event| !event.is_comment())
        .find_map(|event| classify(event, schema, custom_events, depth))
}

fn classify(
    event: &ScriptEvent,
    schema: &EventSchema,
    custom_events: &CustomEventLookup<'_>,
    depth: usize,
) -> Option<Found> {
    if event.command == commands::EVENT_FADE_IN {
        return Some(Found::Manual);
    }
    if schema.waits_for_fade(&event.command) {
        return Some(Found::Wait);
    }
    if event.command == commands::EVENT_CALL_CUSTOM_EVENT && depth < MAX_NESTED_SCRIPT_DEPTH {
        let custom = event
            .arg_str("customEventId")
            .and_then(|id| custom_events.get(id))?;
        let body = bind_custom_event_args(&custom.script, &event.args);
        return scan(&body, schema, custom_events, depth + 1);
    }
    None
}

/// Finds the first top-level event (custom events expanded) that either
/// fades in or has to wait for the fade.
pub fn auto_fade_point(
    script: &[ScriptEvent],
    schema: &EventSchema,
    custom_events: &CustomEventLookup<'_>,
) -> FadePoint {
    for (index, event) in script.iter().enumerate() {
        if event.is_comment() {
            continue;
        }
        match classify(event, schema, custom_events, 0) {
            Some(Found::Manual) => return FadePoint::Manual,
            Some(Found::Wait) => return FadePoint::Before(index),
            None => {}
        }
    }
    FadePoint::Append
}

/// Inserts the automatic fade-in for `speed`; `None` opts the scene out.
pub fn inject_auto_fade(
    script: &mut Vec<ScriptEvent>,
    speed: Option<u8>,
    schema: &EventSchema,
    custom_events: &CustomEventLookup<'_>,
) {
    let Some(speed) = speed else {
        return;
    };
    let fade = ScriptEvent::new(commands::EVENT_FADE_IN)
        .with_id("autofade")
        .with_arg("speed", speed);
    match auto_fade_point(script, schema, custom_events) {
        FadePoint::Manual => {}
        FadePoint::Before(index) => script.insert(index, fade),
        FadePoint::Append => script.push(fade),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::CustomEvent;
    use crate::walk::custom_event_lookup;

    fn point(script: &[ScriptEvent], customs: &[CustomEvent]) -> FadePoint {
        let lookup = custom_event_lookup(customs);
        auto_fade_point(script, &EventSchema::builtin(), &lookup)
    }

    #[test]
    fn fade_goes_before_first_waiting_event() {
        let script = vec![
            ScriptEvent::new("EVENT_SET_VALUE"),
            ScriptEvent::new("EVENT_TEXT"),
        ];
        assert_eq!(point(&script, &[]), FadePoint::Before(1));
    }

    #[test]
    fn explicit_fade_is_manual() {
        let script = vec![ScriptEvent::new(commands::EVENT_FADE_IN)];
        assert_eq!(point(&script, &[]), FadePoint::Manual);
    }

    #[test]
    fn custom_events_are_expanded() {
        let custom = CustomEvent {
            id: "talk".into(),
            script: vec![ScriptEvent::new("EVENT_TEXT")],
            ..Default::default()
        };
        let script = vec![
            ScriptEvent::new("EVENT_SET_VALUE"),
            ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT).with_arg("customEventId", "talk"),
        ];
        assert_eq!(point(&script, &[custom]), FadePoint::Before(1));
    }

    #[test]
    fn no_marker_appends_and_none_opts_out() {
        let lookup = custom_event_lookup(&[]);
        let schema = EventSchema::builtin();
        let mut script = vec![ScriptEvent::new("EVENT_SET_VALUE")];
        inject_auto_fade(&mut script, None, &schema, &lookup);
        assert_eq!(script.len(), 1);
        inject_auto_fade(&mut script, Some(2), &schema, &lookup);
        assert_eq!(script[1].command, commands::EVENT_FADE_IN);
        assert_eq!(script[1].args["speed"], 2);
    }
}
