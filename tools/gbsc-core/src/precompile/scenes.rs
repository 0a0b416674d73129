use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{BackgroundTables, SpriteTables};
use crate::error::{CompileError, Result};
use crate::hash::{ContentKey, StableHasher};
use crate::platform::{MAX_NESTED_SCRIPT_DEPTH, PlatformLimits};
use crate::project::{Actor, Palette, ProjectResources, Scene, ScriptEvent, SpriteMode, Trigger, commands};
use crate::report::Reporter;
use crate::symbols::SymbolAllocator;
use crate::walk::{CustomEventLookup, EventSite, WalkOptions, fold_scene};

/// Fields that define a projectile type; launches that agree on all of them
/// share one projectile slot.
const PROJECTILE_FIELDS: [&str; 10] = [
    "spriteSheetId",
    "spriteStateId",
    "speed",
    "animSpeed",
    "loopAnim",
    "lifeTime",
    "initialOffset",
    "destroyOnHit",
    "collisionGroup",
    "collisionMask",
];

#[derive(Debug, Clone)]
pub struct Projectile {
    pub hash: ContentKey,
    pub sprite_sheet_id: String,
    pub args: Map<String, Value>,
}

impl Projectile {
    fn from_event(event: &ScriptEvent) -> Option<Projectile> {
        let sprite_sheet_id = event.arg_str("spriteSheetId")?.to_string();
        let mut hasher = StableHasher::new("projectile");
        for field in PROJECTILE_FIELDS {
            hasher
                .str(field)
                .value(event.args.get(field).unwrap_or(&Value::Null));
        }
        Some(Projectile {
            hash: hasher.finish(),
            sprite_sheet_id,
            args: event.args.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PrecompiledActor {
    pub actor: Actor,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct PrecompiledTrigger {
    pub trigger: Trigger,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct PrecompiledScene {
    pub index: usize,
    /// The source scene, with its entity lists moved into `actors`/`triggers`.
    pub scene: Scene,
    pub symbol: String,
    pub name: String,
    /// Index into [`BackgroundTables::backgrounds`].
    pub background: usize,
    pub sprite_mode: SpriteMode,
    pub player_sprite: Option<String>,
    pub actors: Vec<PrecompiledActor>,
    pub triggers: Vec<PrecompiledTrigger>,
    /// Sprite ids loaded with the scene, in first-use order.
    pub sprites: Vec<String>,
    pub projectiles: Vec<Projectile>,
    /// Actors (or `player`) whose sprite is swapped at runtime, with the
    /// largest tile count they may need.
    pub actors_exclusive: BTreeMap<String, usize>,
    pub hash: ContentKey,
}

/// Digest over everything in a scene that changes the shape of the scripts
/// compiled against it.
pub fn scene_hash(projectiles: &[Projectile], scene: &Scene, auto_palettes: Option<&[Palette]>) -> ContentKey {
    let mut hasher = StableHasher::new("scene");
    hasher.tag("projectiles").u64(projectiles.len() as u64);
    for projectile in projectiles {
        hasher.str(projectile.hash.as_str());
    }
    hasher
        .bool(!scene.parallax)
        .str(&scene.scene_type)
        .value(&scene.palette_ids)
        .value(&scene.sprite_palette_ids);
    match auto_palettes {
        Some(palettes) => {
            hasher.tag("auto").value(palettes);
        }
        None => {
            hasher.none();
        }
    }
    hasher.finish()
}

fn scene_ref(scene: &Scene, symbol: &str) -> String {
    if scene.name.is_empty() {
        format!("'{}'", symbol)
    } else {
        format!("'{}' : '{}'", symbol, scene.name)
    }
}

#[derive(Default)]
struct SceneEvents {
    sprite_ids: Vec<String>,
    projectiles: Vec<Projectile>,
    exclusive: BTreeMap<String, usize>,
}

fn collect_scene_events(
    scene: &Scene,
    custom_events: &CustomEventLookup<'_>,
    sprites: &SpriteTables,
    sprite_mode: SpriteMode,
) -> SceneEvents {
    let options = WalkOptions {
        custom_events,
        max_depth: MAX_NESTED_SCRIPT_DEPTH,
    };
    let tile_count = |id: &str| sprites.get(id).map_or(0, |s| s.tile_count(sprite_mode));

    fold_scene(
        scene,
        options,
        SceneEvents::default(),
        &mut |mut acc: SceneEvents, event: &ScriptEvent, site: &EventSite<'_>| {
            let Some(sprite_id) = event.arg_str("spriteSheetId") else {
                return acc;
            };
            match event.command.as_str() {
                commands::EVENT_ACTOR_SET_SPRITE => {
                    let mut actor_id = event.arg_str("actorId").unwrap_or_default().to_string();
                    if actor_id == "$self$" {
                        actor_id = site
                            .actor
                            .map_or_else(|| "player".to_string(), |a| a.id.clone());
                    }
                    let count = tile_count(sprite_id);
                    let entry = acc.exclusive.entry(actor_id).or_insert(0);
                    *entry = (*entry).max(count);
                }
                commands::EVENT_PLAYER_SET_SPRITE => {
                    let count = tile_count(sprite_id);
                    let entry = acc.exclusive.entry("player".to_string()).or_insert(0);
                    *entry = (*entry).max(count);
                }
                commands::EVENT_LAUNCH_PROJECTILE => {
                    acc.sprite_ids.push(sprite_id.to_string());
                    if let Some(projectile) = Projectile::from_event(event) {
                        if !acc.projectiles.iter().any(|p| p.hash == projectile.hash) {
                            acc.projectiles.push(projectile);
                        }
                    }
                }
                _ => acc.sprite_ids.push(sprite_id.to_string()),
            }
            acc
        },
    )
}

pub(crate) fn precompile_scenes(
    project: &ProjectResources,
    custom_events: &CustomEventLookup<'_>,
    limits: PlatformLimits,
    backgrounds: &BackgroundTables,
    sprites: &SpriteTables,
    symbols: &mut SymbolAllocator,
    reporter: &Reporter,
) -> Result<Vec<PrecompiledScene>> {
    let settings = &project.settings;
    let mut out = Vec::with_capacity(project.scenes.len());

    for (index, scene) in project.scenes.iter().enumerate() {
        let symbol = symbols.allocate(&scene.symbol, &format!("scene_{}", index + 1));
        let name = scene.display_name(index);
        let label = scene_ref(scene, &symbol);

        let exact = backgrounds.find_with_tileset(&scene.background_id, &scene.tileset_id);
        let Some(background) = exact.or_else(|| backgrounds.find(&scene.background_id)) else {
            return Err(CompileError::MissingBackground { scene: name });
        };
        if exact.is_none() {
            reporter.warn(format!(
                "Error in scene {} includes a common tileset that can't be located.",
                label
            ));
        }

        let sprite_mode = scene.sprite_mode.unwrap_or(settings.sprite_mode);

        if scene.actors.len() > limits.max_actors {
            reporter.warn(format!(
                "Error in scene {} contains {} actors when maximum is {}. Some actors will be removed.",
                label,
                scene.actors.len(),
                limits.max_actors
            ));
        }
        if scene.triggers.len() > limits.max_triggers {
            reporter.warn(format!(
                "Error in scene {} contains {} triggers when maximum is {}. Some triggers will be removed.",
                label,
                scene.triggers.len(),
                limits.max_triggers
            ));
        }

        let actors: Vec<PrecompiledActor> = scene
            .actors
            .iter()
            .take(limits.max_actors)
            .filter(|actor| sprites.get(&actor.sprite_sheet_id).is_some())
            .enumerate()
            .map(|(i, actor)| PrecompiledActor {
                symbol: symbols.allocate(&actor.symbol, &format!("{}_actor_{}", symbol, i)),
                actor: actor.clone(),
            })
            .collect();

        let triggers: Vec<PrecompiledTrigger> = scene
            .triggers
            .iter()
            .take(limits.max_triggers)
            .filter(|trigger| !trigger.is_inert())
            .enumerate()
            .map(|(i, trigger)| PrecompiledTrigger {
                symbol: symbols.allocate(&trigger.symbol, &format!("{}_trigger_{}", symbol, i)),
                trigger: trigger.clone(),
            })
            .collect();

        let player_sprite_id = if scene.player_sprite_sheet_id.is_empty() {
            settings
                .default_player_sprites
                .get(&scene.scene_type)
                .cloned()
                .unwrap_or_default()
        } else {
            scene.player_sprite_sheet_id.clone()
        };
        let mut player_sprite = sprites.get(&player_sprite_id).map(|s| s.id.clone());
        if player_sprite.is_none() && scene.scene_type != "LOGO" {
            reporter.warn(format!(
                "No player sprite set for scene type {}, using the first available sprite",
                scene.scene_type
            ));
            player_sprite = sprites.sprites.first().map(|s| s.id.clone());
        }

        let SceneEvents {
            sprite_ids: event_sprite_ids,
            mut projectiles,
            exclusive,
        } = collect_scene_events(scene, custom_events, sprites, sprite_mode);

        let mut scene_sprites: Vec<String> = Vec::new();
        let candidates = actors
            .iter()
            .filter(|a| !exclusive.contains_key(&a.actor.id))
            .map(|a| a.actor.sprite_sheet_id.clone())
            .chain(event_sprite_ids);
        for id in candidates {
            if sprites.get(&id).is_some() && !scene_sprites.contains(&id) {
                scene_sprites.push(id);
            }
        }

        let mismatched: Vec<_> = scene_sprites
            .iter()
            .filter_map(|id| sprites.get(id))
            .filter(|s| s.sprite_mode != sprite_mode)
            .collect();
        if let Some(first) = mismatched.first() {
            let names: Vec<&str> = mismatched.iter().map(|s| s.name.as_str()).collect();
            reporter.warn(format!(
                "Scene '{}' uses {} sprite mode but sprites {} use {}, they may not display correctly.",
                name,
                sprite_mode.as_str(),
                names.join(", "),
                first.sprite_mode.as_str()
            ));
        }

        if projectiles.len() > limits.max_projectiles {
            reporter.warn(format!(
                "Scene '{}' contains {} unique projectiles when maximum is {}. Some projectiles will be removed.",
                name,
                projectiles.len(),
                limits.max_projectiles
            ));
            projectiles.truncate(limits.max_projectiles);
        }

        let hash = scene_hash(
            &projectiles,
            scene,
            backgrounds.backgrounds[background].auto_palettes.as_deref(),
        );

        out.push(PrecompiledScene {
            index,
            scene: Scene {
                actors: Vec::new(),
                triggers: Vec::new(),
                ..scene.clone()
            },
            symbol,
            name,
            background,
            sprite_mode,
            player_sprite,
            actors,
            triggers,
            sprites: scene_sprites,
            projectiles,
            actors_exclusive: exclusive,
            hash,
        });
    }
    Ok(out)
}
