//! Minimal set of assets reachable from any script in the project.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::platform::MAX_NESTED_SCRIPT_DEPTH;
use crate::project::{
    Avatar, Background, Emote, Font, MusicDriver, MusicTrack, ProjectResources, ScriptEvent,
    Sound, SpriteSheet, Tileset, commands,
};
use crate::schema::{ArgKind, EventSchema};
use crate::walk::{CustomEventLookup, EventSite, WalkOptions, fold_scenes};

/// An asset together with the ids of the entities that use it.
#[derive(Debug, Clone)]
pub struct ReferencedAsset<T> {
    pub asset: T,
    pub referenced_by: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct UsedAssets {
    pub backgrounds: Vec<ReferencedAsset<Background>>,
    pub tilesets: Vec<ReferencedAsset<Tileset>>,
    pub sprites: Vec<ReferencedAsset<SpriteSheet>>,
    pub fonts: Vec<ReferencedAsset<Font>>,
    pub avatars: Vec<ReferencedAsset<Avatar>>,
    pub emotes: Vec<ReferencedAsset<Emote>>,
    pub music: Vec<ReferencedAsset<MusicTrack>>,
    pub sounds: Vec<ReferencedAsset<Sound>>,
    /// Global variable ids in first-use order.
    pub variables: Vec<String>,
}

/// Asset id to referencing entity ids, per class.
#[derive(Default)]
struct References {
    by_kind: IndexMap<ArgKind, IndexMap<String, BTreeSet<String>>>,
}

impl References {
    fn add(&mut self, kind: ArgKind, id: &str, entity: &str) {
        if id.is_empty() {
            return;
        }
        self.by_kind
            .entry(kind)
            .or_default()
            .entry(id.to_string())
            .or_default()
            .insert(entity.to_string());
    }

    fn get(&self, kind: ArgKind) -> Option<&IndexMap<String, BTreeSet<String>>> {
        self.by_kind.get(&kind)
    }

    fn ids(&self, kind: ArgKind) -> Vec<String> {
        self.get(kind)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default()
    }
}

pub struct UsedAssetResolver<'a> {
    project: &'a ProjectResources,
    schema: &'a EventSchema,
    custom_events: &'a CustomEventLookup<'a>,
}

impl<'a> UsedAssetResolver<'a> {
    pub fn new(
        project: &'a ProjectResources,
        schema: &'a EventSchema,
        custom_events: &'a CustomEventLookup<'a>,
    ) -> Self {
        UsedAssetResolver {
            project,
            schema,
            custom_events,
        }
    }

    pub fn resolve(&self) -> UsedAssets {
        let options = WalkOptions {
            custom_events: self.custom_events,
            max_depth: MAX_NESTED_SCRIPT_DEPTH,
        };
        let mut refs = fold_scenes(
            &self.project.scenes,
            options,
            References::default(),
            &mut |mut refs: References, event: &ScriptEvent, site: &EventSite<'_>| {
                let entity = site
                    .actor
                    .map(|a| a.id.as_str())
                    .or(site.trigger.map(|t| t.id.as_str()))
                    .or(site.scene.map(|s| s.id.as_str()))
                    .unwrap_or_default();
                self.collect_event(&mut refs, event, entity);
                refs
            },
        );
        self.add_implicit(&mut refs);
        self.materialize(&refs)
    }

    fn collect_event(&self, refs: &mut References, event: &ScriptEvent, entity: &str) {
        for (key, value) in &event.args {
            if key == "references" {
                for reference in value.as_array().into_iter().flatten() {
                    let kind = reference
                        .get("type")
                        .and_then(Value::as_str)
                        .and_then(ArgKind::from_reference_type);
                    let id = reference.get("id").and_then(Value::as_str);
                    if let (Some(kind), Some(id)) = (kind, id) {
                        refs.add(kind, id, entity);
                    }
                }
                continue;
            }
            let Some(kind) = self.schema.arg_kind(&event.command, key) else {
                continue;
            };
            if let Some(id) = referenced_id(kind, value) {
                refs.add(kind, &id, entity);
            }
        }
        if event.command == commands::EVENT_MUSIC_PLAY && event.arg_str("musicId").is_none() {
            if let Some(first) = self.project.music.first() {
                refs.add(ArgKind::Music, &first.id, entity);
            }
        }
    }

    fn add_implicit(&self, refs: &mut References) {
        let settings = &self.project.settings;
        for scene in &self.project.scenes {
            refs.add(ArgKind::Background, &scene.background_id, &scene.id);
            refs.add(ArgKind::Tileset, &scene.tileset_id, &scene.id);
            let player = if scene.player_sprite_sheet_id.is_empty() {
                settings
                    .default_player_sprites
                    .get(&scene.scene_type)
                    .map(String::as_str)
                    .unwrap_or_default()
            } else {
                scene.player_sprite_sheet_id.as_str()
            };
            refs.add(ArgKind::Sprite, player, &scene.id);
            for actor in &scene.actors {
                refs.add(ArgKind::Sprite, &actor.sprite_sheet_id, &actor.id);
            }
        }
        for sprite in settings.default_player_sprites.values() {
            refs.add(ArgKind::Sprite, sprite, "settings");
        }
        let default_font = if settings.default_font_id.is_empty() {
            self.project.fonts.first().map(|f| f.id.as_str()).unwrap_or_default()
        } else {
            settings.default_font_id.as_str()
        };
        refs.add(ArgKind::Font, default_font, "settings");
    }

    fn materialize(&self, refs: &References) -> UsedAssets {
        let project = self.project;
        let mut fonts = pick(&project.fonts, refs.get(ArgKind::Font), |f| &f.id);
        if fonts.is_empty() {
            if let Some(first) = project.fonts.first() {
                fonts.push(ReferencedAsset {
                    asset: first.clone(),
                    referenced_by: BTreeSet::from(["settings".to_string()]),
                });
            }
        }
        UsedAssets {
            backgrounds: pick(&project.backgrounds, refs.get(ArgKind::Background), |b| &b.id),
            tilesets: pick(&project.tilesets, refs.get(ArgKind::Tileset), |t| &t.id),
            sprites: pick(&project.sprites, refs.get(ArgKind::Sprite), |s| &s.id),
            fonts,
            avatars: pick(&project.avatars, refs.get(ArgKind::Avatar), |a| &a.id),
            emotes: pick(&project.emotes, refs.get(ArgKind::Emote), |e| &e.id),
            music: self.driver_music(refs),
            sounds: pick(&project.sounds, refs.get(ArgKind::Sound), |s| &s.id),
            variables: refs
                .ids(ArgKind::Variable)
                .into_iter()
                .filter(|id| self.is_global_variable(id))
                .collect(),
        }
    }

    /// Tracks written for the other music driver are replaced by the first
    /// track of the active driver, keeping the referencing id.
    fn driver_music(&self, refs: &References) -> Vec<ReferencedAsset<MusicTrack>> {
        let huge = self.project.settings.music_driver == MusicDriver::Huge;
        let fallback = self.project.music.iter().find(|t| t.is_uge() == huge);
        pick(&self.project.music, refs.get(ArgKind::Music), |m| &m.id)
            .into_iter()
            .filter_map(|track| {
                if track.asset.is_uge() == huge {
                    return Some(track);
                }
                let replacement = fallback?;
                Some(ReferencedAsset {
                    asset: MusicTrack {
                        id: track.asset.id,
                        ..replacement.clone()
                    },
                    referenced_by: track.referenced_by,
                })
            })
            .collect()
    }

    fn is_global_variable(&self, id: &str) -> bool {
        id.chars().all(|c| c.is_ascii_digit())
            || self.project.variables.variables.iter().any(|v| v.id == id)
    }
}

/// Assets from `all` that appear in `refs`, in project order.
fn pick<T: Clone>(
    all: &[T],
    refs: Option<&IndexMap<String, BTreeSet<String>>>,
    id: impl Fn(&T) -> &String,
) -> Vec<ReferencedAsset<T>> {
    let Some(refs) = refs else {
        return Vec::new();
    };
    all.iter()
        .filter_map(|asset| {
            refs.get(id(asset)).map(|by| ReferencedAsset {
                asset: asset.clone(),
                referenced_by: by.clone(),
            })
        })
        .collect()
}

fn referenced_id(kind: ArgKind, value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if kind == ArgKind::Variable => Some(n.to_string()),
        Value::Object(map) if kind == ArgKind::Variable => {
            (map.get("type").and_then(Value::as_str) == Some("variable"))
                .then(|| map.get("value").and_then(Value::as_str).map(String::from))
                .flatten()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Actor, CustomEvent, Scene};
    use crate::walk::custom_event_lookup;

    fn project() -> ProjectResources {
        let mut project = ProjectResources::default();
        project.backgrounds = ["bg1", "bg2", "unused"]
            .iter()
            .map(|id| Background {
                id: id.to_string(),
                ..Default::default()
            })
            .collect();
        project.sprites = ["hero", "npc", "boom"]
            .iter()
            .map(|id| SpriteSheet {
                id: id.to_string(),
                ..Default::default()
            })
            .collect();
        project.music = vec![
            MusicTrack {
                id: "theme".into(),
                symbol: "song_theme".into(),
                kind: "mod".into(),
                ..Default::default()
            },
            MusicTrack {
                id: "boss".into(),
                symbol: "song_boss".into(),
                kind: "uge".into(),
                ..Default::default()
            },
        ];
        project.fonts = vec![Font {
            id: "f1".into(),
            ..Default::default()
        }];
        project.scripts = vec![CustomEvent {
            id: "explode".into(),
            script: vec![
                ScriptEvent::new("EVENT_LAUNCH_PROJECTILE").with_arg("spriteSheetId", "$sprite$"),
            ],
            ..Default::default()
        }];
        project.scenes = vec![Scene {
            id: "s1".into(),
            background_id: "bg1".into(),
            player_sprite_sheet_id: "hero".into(),
            actors: vec![Actor {
                id: "a1".into(),
                sprite_sheet_id: "npc".into(),
                script: vec![
                    ScriptEvent::new("EVENT_IF_TRUE").with_branch(
                        "true",
                        vec![
                            ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT)
                                .with_arg("customEventId", "explode")
                                .with_arg("sprite", "boom"),
                        ],
                    ),
                ],
                ..Default::default()
            }],
            script: vec![
                ScriptEvent::new("EVENT_SWITCH_SCENE").with_arg("backgroundId", "bg2"),
                ScriptEvent::new(commands::EVENT_MUSIC_PLAY).with_arg("musicId", "boss"),
                ScriptEvent::new("EVENT_SET_VALUE").with_arg("variable", "3"),
                ScriptEvent::new("EVENT_SET_VALUE").with_arg("variable", "L0"),
            ],
            ..Default::default()
        }];
        project
    }

    #[test]
    fn resolves_only_reachable_assets() {
        let project = project();
        let lookup = custom_event_lookup(&project.scripts);
        let schema = EventSchema::builtin();
        let used = UsedAssetResolver::new(&project, &schema, &lookup).resolve();

        let ids = |v: &[ReferencedAsset<Background>]| {
            v.iter().map(|r| r.asset.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&used.backgrounds), vec!["bg1", "bg2"]);

        let sprite_ids: Vec<_> = used.sprites.iter().map(|r| r.asset.id.as_str()).collect();
        assert_eq!(sprite_ids, vec!["hero", "npc", "boom"]);
        let boom = &used.sprites[2];
        assert!(boom.referenced_by.contains("a1"));

        assert_eq!(used.variables, vec!["3"]);
        assert_eq!(used.fonts.len(), 1);
    }

    #[test]
    fn wrong_driver_music_falls_back_to_driver_track() {
        let project = project();
        let lookup = custom_event_lookup(&project.scripts);
        let schema = EventSchema::builtin();
        let used = UsedAssetResolver::new(&project, &schema, &lookup).resolve();
        assert_eq!(used.music.len(), 1);
        assert_eq!(used.music[0].asset.id, "boss");
        assert_eq!(used.music[0].asset.symbol, "song_theme");
    }
}
