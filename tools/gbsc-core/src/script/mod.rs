//! Lowering of entity scripts into GBVM assembly listings.
//!
//! Every scene yields an init script plus combined player-hit, actor and
//! trigger scripts. Custom event bodies are compiled once per (custom event,
//! bound arguments) pair and called from every site that uses them.

mod fade;
mod lower;

use std::collections::HashMap;

use crate::error::Result;
use crate::hash::ContentKey;
use crate::output::ArtifactSet;
use crate::precompile::{Precompiled, PrecompiledScene};
use crate::project::{Actor, Scene, ScriptEvent, SpriteMode, commands, is_empty_script};
use crate::report::Reporter;
use crate::schema::EventSchema;
use crate::symbols::SymbolAllocator;
use crate::walk::CustomEventLookup;

pub use fade::{FadePoint, auto_fade_point, inject_auto_fade};
pub use lower::script_header;

/// A named code unit and its listing.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub symbol: String,
    pub entity_id: String,
    pub script_key: String,
    pub text: String,
}

/// Script slot of an entity, which also names the compiled symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSlot {
    Init,
    PlayerHit,
    Interact,
    Update,
    Hit(u8),
}

impl ScriptSlot {
    pub fn code(self) -> String {
        match self {
            ScriptSlot::Init => "init".to_string(),
            ScriptSlot::PlayerHit => "p_hit1".to_string(),
            ScriptSlot::Interact => "interact".to_string(),
            ScriptSlot::Update => "update".to_string(),
            ScriptSlot::Hit(n) => format!("hit{}", n),
        }
    }

    fn key(self) -> &'static str {
        match self {
            ScriptSlot::Init | ScriptSlot::Interact => "script",
            ScriptSlot::PlayerHit => "playerHit1Script",
            ScriptSlot::Update => "updateScript",
            ScriptSlot::Hit(_) => "hitScript",
        }
    }
}

/// Which mutually exclusive script variants an entity combines, and whether
/// a lone variant may skip its parameter guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePolicy {
    /// Trigger enter (1) and leave (2).
    TriggerEnterLeave,
    /// Scene player hit groups 1..3 (2, 4, 8).
    PlayerHit,
    /// Actor with a collision group: interact (0) and hit groups (2, 4, 8).
    ActorCollision,
}

impl CombinePolicy {
    pub fn collapsible(self) -> bool {
        matches!(self, CombinePolicy::TriggerEnterLeave)
    }
}

pub struct Variant<'s> {
    pub parameter: u8,
    pub value: u8,
    pub script: &'s [ScriptEvent],
}

/// Merges variants into one script of parameter-guarded branches. A single
/// non-empty variant is returned as-is when the policy allows collapsing.
pub fn combine_scripts(variants: &[Variant<'_>], policy: CombinePolicy) -> Vec<ScriptEvent> {
    let present: Vec<&Variant<'_>> = variants.iter().filter(|v| !v.script.is_empty()).collect();
    if policy.collapsible() && present.len() == 1 {
        return present[0].script.to_vec();
    }
    present
        .into_iter()
        .map(|v| {
            ScriptEvent::new(commands::INTERNAL_IF_PARAM)
                .with_arg("parameter", v.parameter)
                .with_arg("value", v.value)
                .with_branch("true", v.script.to_vec())
        })
        .collect()
}

/// Compiled entry points of one scene; `None` where nothing was emitted.
#[derive(Debug, Clone, Default)]
pub struct SceneScripts {
    pub init: Option<String>,
    pub player_hit: Option<String>,
    pub actors: Vec<Option<String>>,
    pub actor_updates: Vec<Option<String>>,
    pub triggers: Vec<Option<String>>,
}

pub struct LowerContext<'a> {
    pub precompiled: &'a Precompiled,
    pub schema: &'a EventSchema,
    pub custom_events: &'a CustomEventLookup<'a>,
    /// Variable id to the alias used in listings.
    pub variables: &'a HashMap<String, String>,
}

#[derive(Clone, Copy)]
struct EntityRef<'e> {
    id: &'e str,
    symbol: &'e str,
}

#[derive(Clone, Copy, Default)]
struct ScriptFlags {
    lock: bool,
    looped: bool,
    /// Emit even when empty (scene init with an automatic fade).
    keep_empty: bool,
}

pub struct ScriptCompiler<'a> {
    ctx: LowerContext<'a>,
    symbols: &'a mut SymbolAllocator,
    reporter: &'a Reporter,
    memo: HashMap<ContentKey, String>,
    compiled: Vec<CompiledScript>,
}

impl<'a> ScriptCompiler<'a> {
    pub fn new(
        ctx: LowerContext<'a>,
        symbols: &'a mut SymbolAllocator,
        reporter: &'a Reporter,
    ) -> Self {
        ScriptCompiler {
            ctx,
            symbols,
            reporter,
            memo: HashMap::new(),
            compiled: Vec::new(),
        }
    }

    pub fn compile_scene(&mut self, scene: &PrecompiledScene) -> SceneScripts {
        let source = &scene.scene;
        let scene_entity = EntityRef {
            id: &source.id,
            symbol: &scene.symbol,
        };

        let mut init = init_events(
            source,
            scene.actors.iter().map(|a| &a.actor),
            scene.sprite_mode,
        );
        inject_auto_fade(
            &mut init,
            source.auto_fade_speed,
            self.ctx.schema,
            self.ctx.custom_events,
        );
        let init = self.compile(
            scene_entity,
            ScriptSlot::Init,
            &init,
            ScriptFlags {
                lock: true,
                keep_empty: source.auto_fade_speed.is_some(),
                ..Default::default()
            },
        );

        let player_hit = combine_scripts(
            &[
                Variant { parameter: 0, value: 2, script: &source.player_hit1_script },
                Variant { parameter: 0, value: 4, script: &source.player_hit2_script },
                Variant { parameter: 0, value: 8, script: &source.player_hit3_script },
            ],
            CombinePolicy::PlayerHit,
        );
        let player_hit = self.compile(
            scene_entity,
            ScriptSlot::PlayerHit,
            &player_hit,
            ScriptFlags::default(),
        );

        let mut scripts = SceneScripts {
            init,
            player_hit,
            ..Default::default()
        };

        for actor in &scene.actors {
            let entity = EntityRef {
                id: &actor.actor.id,
                symbol: &actor.symbol,
            };
            let update = if actor.actor.update_script.is_empty() {
                None
            } else {
                self.compile(
                    entity,
                    ScriptSlot::Update,
                    &actor.actor.update_script,
                    ScriptFlags {
                        looped: true,
                        ..Default::default()
                    },
                )
            };
            scripts.actor_updates.push(update);

            let interact = if actor.actor.collision_group.is_empty() {
                self.compile(
                    entity,
                    ScriptSlot::Interact,
                    &actor.actor.script,
                    ScriptFlags {
                        lock: true,
                        ..Default::default()
                    },
                )
            } else {
                let combined = combine_scripts(
                    &[
                        Variant { parameter: 0, value: 0, script: &actor.actor.script },
                        Variant { parameter: 0, value: 2, script: &actor.actor.hit1_script },
                        Variant { parameter: 0, value: 4, script: &actor.actor.hit2_script },
                        Variant { parameter: 0, value: 8, script: &actor.actor.hit3_script },
                    ],
                    CombinePolicy::ActorCollision,
                );
                self.compile(entity, ScriptSlot::Interact, &combined, ScriptFlags::default())
            };
            scripts.actors.push(interact);
        }

        for trigger in &scene.triggers {
            let combined = combine_scripts(
                &[
                    Variant { parameter: 0, value: 1, script: &trigger.trigger.script },
                    Variant { parameter: 0, value: 2, script: &trigger.trigger.leave_script },
                ],
                CombinePolicy::TriggerEnterLeave,
            );
            let entity = EntityRef {
                id: &trigger.trigger.id,
                symbol: &trigger.symbol,
            };
            let compiled = self.compile(
                entity,
                ScriptSlot::Interact,
                &combined,
                ScriptFlags {
                    lock: true,
                    ..Default::default()
                },
            );
            scripts.triggers.push(compiled);
        }

        scripts
    }

    fn compile(
        &mut self,
        entity: EntityRef<'_>,
        slot: ScriptSlot,
        events: &[ScriptEvent],
        flags: ScriptFlags,
    ) -> Option<String> {
        if is_empty_script(events) && !(slot == ScriptSlot::Init && flags.keep_empty) {
            return None;
        }
        let symbol = self
            .symbols
            .allocate(&format!("{}_{}", entity.symbol, slot.code()), "script");
        let text = self.lower_entity_script(&symbol, events, flags);
        self.compiled.push(CompiledScript {
            symbol: symbol.clone(),
            entity_id: entity.id.to_string(),
            script_key: slot.key().to_string(),
            text,
        });
        Some(symbol)
    }

    pub fn scripts(&self) -> &[CompiledScript] {
        &self.compiled
    }

    /// Registers a listing and a header per compiled script.
    pub fn into_artifacts(self) -> Result<ArtifactSet> {
        let mut artifacts = ArtifactSet::new();
        for script in self.compiled {
            artifacts.insert(format!("{}.s", script.symbol), script.text)?;
            artifacts.insert(format!("{}.h", script.symbol), script_header(&script.symbol))?;
        }
        Ok(artifacts)
    }
}

/// Actor start scripts, then the scene script led by the sprite mode switch.
fn init_events<'a>(
    scene: &Scene,
    actors: impl IntoIterator<Item = &'a Actor>,
    sprite_mode: SpriteMode,
) -> Vec<ScriptEvent> {
    let mut init = Vec::new();
    for actor in actors {
        if actor.start_script.is_empty() {
            continue;
        }
        init.push(context_event("actor", &actor.id, "startScript"));
        init.extend(
            actor
                .start_script
                .iter()
                .filter(|e| e.command != commands::EVENT_END)
                .cloned(),
        );
    }
    init.push(context_event("scene", &scene.id, "script"));
    init.push(
        ScriptEvent::new(commands::INTERNAL_SET_SPRITE_MODE).with_arg("mode", sprite_mode.as_str()),
    );
    init.extend(scene.script.iter().cloned());
    init
}

fn context_event(entity_type: &str, entity_id: &str, script_key: &str) -> ScriptEvent {
    ScriptEvent::new(commands::INTERNAL_SET_CONTEXT)
        .with_arg("entityType", entity_type)
        .with_arg("entityId", entity_id)
        .with_arg("scriptKey", script_key)
}
