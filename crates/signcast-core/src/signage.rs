use crate::error::{ReferenceMap, Result, SigncastError};
use crate::media::MediaStore;
use crate::object_store::{ObjectStore, StoreLookups};
use crate::paths;
use crate::schedule::Schedule;
use crate::template::{Template, TemplateKind, TemplateStore};
use crate::value::{ObjectValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_SCENE_DURATION: i64 = 10;

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    None,
    Push,
    Fade,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::None => "none",
            Transition::Push => "push",
            Transition::Fade => "fade",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Transition {
    type Err = SigncastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Transition::None),
            "push" => Ok(Transition::Push),
            "fade" => Ok(Transition::Fade),
            _ => Err(SigncastError::InvalidValue {
                field: "transition".to_string(),
                reason: format!("unknown transition '{s}'"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Scene / Frame
// ---------------------------------------------------------------------------

/// One playlist entry: a scene template instantiated with data, plus playback
/// duration, transition and visibility schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    template_id: String,
    values: ObjectValue,
    duration: i64,
    transition: Transition,
    schedule: Schedule,
}

impl Scene {
    pub fn new(template: &Template) -> Result<Self> {
        Ok(Self {
            template_id: template.id.clone(),
            values: ObjectValue::new_default(&template.id, &template.definition)?,
            duration: DEFAULT_SCENE_DURATION,
            transition: Transition::None,
            schedule: Schedule::default(),
        })
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn values(&self) -> &ObjectValue {
        &self.values
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Swapping the template resets the data to a fresh default of the new
    /// schema; the caller persists once.
    pub fn set_template(&mut self, template: &Template) -> Result<()> {
        self.values = ObjectValue::new_default(&template.id, &template.definition)?;
        self.template_id = template.id.clone();
        Ok(())
    }

    pub fn set_duration(&mut self, duration: i64) -> Result<()> {
        if duration < 0 {
            return Err(SigncastError::NegativeDuration(duration));
        }
        self.duration = duration;
        Ok(())
    }

    pub fn set_transition(&mut self, transition: Transition) {
        self.transition = transition;
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.schedule = schedule;
    }
}

/// The persistent surround every scene is composed into.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    template_id: String,
    values: ObjectValue,
}

impl Frame {
    pub fn new(template: &Template) -> Result<Self> {
        Ok(Self {
            template_id: template.id.clone(),
            values: ObjectValue::new_default(&template.id, &template.definition)?,
        })
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn values(&self) -> &ObjectValue {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Signage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Signage {
    id: String,
    pub title: String,
    pub description: String,
    frame: Frame,
    scenes: Vec<Scene>,
}

impl Signage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Result<&Scene> {
        self.scenes
            .get(index)
            .ok_or_else(|| SigncastError::SceneOutOfRange {
                signage_id: self.id.clone(),
                index,
            })
    }

    fn scene_mut(&mut self, index: usize) -> Result<&mut Scene> {
        if index >= self.scenes.len() {
            return Err(SigncastError::SceneOutOfRange {
                signage_id: self.id.clone(),
                index,
            });
        }
        Ok(&mut self.scenes[index])
    }
}

// ---------------------------------------------------------------------------
// Wire documents
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct FrameDoc {
    id: String,
    data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct SceneDoc {
    id: String,
    duration: i64,
    transition: Transition,
    scheduling: Schedule,
    data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct SignageDoc {
    title: String,
    description: String,
    frame: FrameDoc,
    scenes: Vec<SceneDoc>,
}

// ---------------------------------------------------------------------------
// SignageManager
// ---------------------------------------------------------------------------

/// Owns every signage under one root, one JSON document per signage.
/// All mutation validates, applies in memory, then persists the document.
#[derive(Debug, Default)]
pub struct SignageManager {
    root: PathBuf,
    signages: BTreeMap<String, Signage>,
}

impl SignageManager {
    pub fn load(root: &Path, templates: &TemplateStore) -> Result<Self> {
        let mut manager = Self {
            root: root.to_path_buf(),
            signages: BTreeMap::new(),
        };
        if !root.exists() {
            return Ok(manager);
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(signage_id) = name.strip_suffix(".json") else {
                continue;
            };
            paths::validate_id(signage_id)?;
            let data = std::fs::read_to_string(entry.path())?;
            let doc: SignageDoc = serde_json::from_str(&data)?;
            let signage = Self::from_doc(signage_id, doc, templates)?;
            info!(signage_id, scenes = signage.scenes.len(), "signage loaded");
            manager.signages.insert(signage_id.to_string(), signage);
        }
        Ok(manager)
    }

    fn from_doc(signage_id: &str, doc: SignageDoc, templates: &TemplateStore) -> Result<Signage> {
        let frame_template = templates.get_frame_template(&doc.frame.id)?;
        let frame = Frame {
            template_id: doc.frame.id.clone(),
            values: ObjectValue::from_snapshot(
                &doc.frame.id,
                &frame_template.definition,
                &doc.frame.data,
            )?,
        };
        let mut scenes = Vec::with_capacity(doc.scenes.len());
        for scene_doc in doc.scenes {
            let template = templates.get_scene_template(&scene_doc.id)?;
            let mut scene = Scene {
                template_id: scene_doc.id.clone(),
                values: ObjectValue::from_snapshot(
                    &scene_doc.id,
                    &template.definition,
                    &scene_doc.data,
                )?,
                duration: 0,
                transition: scene_doc.transition,
                schedule: scene_doc.scheduling,
            };
            scene.set_duration(scene_doc.duration)?;
            scenes.push(scene);
        }
        Ok(Signage {
            id: signage_id.to_string(),
            title: doc.title,
            description: doc.description,
            frame,
            scenes,
        })
    }

    fn to_doc(signage: &Signage, templates: &TemplateStore) -> Result<SignageDoc> {
        let frame_template = templates.get_frame_template(&signage.frame.template_id)?;
        let frame = FrameDoc {
            id: signage.frame.template_id.clone(),
            data: signage.frame.values.snapshot(&frame_template.definition),
        };
        let mut scenes = Vec::with_capacity(signage.scenes.len());
        for scene in &signage.scenes {
            let template = templates.get_scene_template(&scene.template_id)?;
            scenes.push(SceneDoc {
                id: scene.template_id.clone(),
                duration: scene.duration,
                transition: scene.transition,
                scheduling: scene.schedule.clone(),
                data: scene.values.snapshot(&template.definition),
            });
        }
        Ok(SignageDoc {
            title: signage.title.clone(),
            description: signage.description.clone(),
            frame,
            scenes,
        })
    }

    fn save(&self, signage_id: &str, templates: &TemplateStore) -> Result<()> {
        let signage = self.get_signage(signage_id)?;
        let doc = Self::to_doc(signage, templates)?;
        let path = paths::signage_file(&self.root, signage_id);
        let data = serde_json::to_string_pretty(&doc)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        debug!(signage_id, "signage saved");
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------------

    pub fn get_signage(&self, signage_id: &str) -> Result<&Signage> {
        self.signages
            .get(signage_id)
            .ok_or_else(|| SigncastError::SignageNotFound(signage_id.to_string()))
    }

    pub fn signages(&self) -> impl Iterator<Item = &Signage> {
        self.signages.values()
    }

    pub fn has_signage(&self, signage_id: &str) -> bool {
        self.signages.contains_key(signage_id)
    }

    // ---------------------------------------------------------------------------
    // Mutation gateways
    // ---------------------------------------------------------------------------

    pub fn create_signage(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        title: &str,
        description: &str,
        frame_template_id: &str,
    ) -> Result<()> {
        paths::validate_id(signage_id)?;
        if self.signages.contains_key(signage_id) {
            return Err(SigncastError::IdExists(signage_id.to_string()));
        }
        let frame = Frame::new(templates.get_frame_template(frame_template_id)?)?;
        let signage = Signage {
            id: signage_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            frame,
            scenes: Vec::new(),
        };
        self.signages.insert(signage_id.to_string(), signage);
        self.save(signage_id, templates)
    }

    pub fn set_title(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        title: &str,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.title = title.to_string();
            Ok(())
        })
    }

    pub fn set_description(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        description: &str,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.description = description.to_string();
            Ok(())
        })
    }

    pub fn add_scene(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        template_id: &str,
    ) -> Result<()> {
        let scene = Scene::new(templates.get_scene_template(template_id)?)?;
        self.with_signage(signage_id, templates, |s| {
            s.scenes.push(scene);
            Ok(())
        })
    }

    pub fn remove_scene(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        index: usize,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.scene(index)?;
            s.scenes.remove(index);
            Ok(())
        })
    }

    /// Swap the scenes at positions `a` and `b`; everything else stays put.
    pub fn rearrange_scene(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        a: usize,
        b: usize,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.scene(a)?;
            s.scene(b)?;
            s.scenes.swap(a, b);
            Ok(())
        })
    }

    pub fn set_scene_duration(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        index: usize,
        duration: i64,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.scene_mut(index)?.set_duration(duration)
        })
    }

    pub fn set_scene_transition(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        index: usize,
        transition: Transition,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.scene_mut(index)?.set_transition(transition);
            Ok(())
        })
    }

    pub fn set_scene_schedule(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        index: usize,
        schedule: Schedule,
    ) -> Result<()> {
        self.with_signage(signage_id, templates, |s| {
            s.scene_mut(index)?.set_schedule(schedule);
            Ok(())
        })
    }

    /// Swap a scene's template; its data resets to the new schema's defaults
    /// and the document is written once.
    pub fn set_scene_template(
        &mut self,
        templates: &TemplateStore,
        signage_id: &str,
        index: usize,
        template_id: &str,
    ) -> Result<()> {
        let template = templates.get_scene_template(template_id)?.clone();
        self.with_signage(signage_id, templates, |s| {
            s.scene_mut(index)?.set_template(&template)
        })
    }

    /// Mutate one field of a scene's data through the validation gateway.
    pub fn set_scene_field(
        &mut self,
        templates: &TemplateStore,
        objects: &ObjectStore,
        media: &MediaStore,
        signage_id: &str,
        index: usize,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        let lookups = StoreLookups { objects, media };
        let template_id = self.get_signage(signage_id)?.scene(index)?.template_id.clone();
        let definition = templates.get_scene_template(&template_id)?.definition.clone();
        self.with_signage(signage_id, templates, |s| {
            s.scene_mut(index)?
                .values
                .set_field(&definition, field_id, value, &lookups)
        })
    }

    /// Mutate one field of the frame's data.
    pub fn set_frame_field(
        &mut self,
        templates: &TemplateStore,
        objects: &ObjectStore,
        media: &MediaStore,
        signage_id: &str,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        let lookups = StoreLookups { objects, media };
        let template_id = self.get_signage(signage_id)?.frame.template_id.clone();
        let definition = templates.get_frame_template(&template_id)?.definition.clone();
        self.with_signage(signage_id, templates, |s| {
            s.frame.values.set_field(&definition, field_id, value, &lookups)
        })
    }

    /// Apply a mutation, persisting on success. A failed mutation leaves the
    /// in-memory signage untouched (the closure runs on a staged clone).
    fn with_signage<F>(&mut self, signage_id: &str, templates: &TemplateStore, f: F) -> Result<()>
    where
        F: FnOnce(&mut Signage) -> Result<()>,
    {
        let mut staged = self.get_signage(signage_id)?.clone();
        f(&mut staged)?;
        self.signages.insert(signage_id.to_string(), staged);
        self.save(signage_id, templates)
    }

    // ---------------------------------------------------------------------------
    // Rename / removal primitives (gated by the ContentStore reference index)
    // ---------------------------------------------------------------------------

    /// Re-key a signage and move its backing document. Channel notification
    /// is the caller's job and must happen before the old file disappears.
    pub(crate) fn rename_signage(
        &mut self,
        templates: &TemplateStore,
        old_id: &str,
        new_id: &str,
    ) -> Result<()> {
        paths::validate_id(new_id)?;
        if self.signages.contains_key(new_id) {
            return Err(SigncastError::IdExists(new_id.to_string()));
        }
        let mut signage = self.get_signage(old_id)?.clone();
        signage.id = new_id.to_string();
        self.signages.remove(old_id);
        self.signages.insert(new_id.to_string(), signage);
        self.save(new_id, templates)?;
        let old_path = paths::signage_file(&self.root, old_id);
        if old_path.exists() {
            std::fs::remove_file(old_path)?;
        }
        Ok(())
    }

    pub(crate) fn remove_signage_unchecked(&mut self, signage_id: &str) -> Result<()> {
        self.get_signage(signage_id)?;
        self.signages.remove(signage_id);
        let path = paths::signage_file(&self.root, signage_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Rewrite, in every frame and scene, pointers at `target_type/old_id`
    /// to `new_id`, persisting each changed signage.
    pub(crate) fn rename_references(
        &mut self,
        templates: &TemplateStore,
        target_type: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<()> {
        let mut dirty = Vec::new();
        for (signage_id, signage) in &mut self.signages {
            let mut changed = false;
            if let Ok(t) = templates.get_frame_template(&signage.frame.template_id) {
                changed |= signage
                    .frame
                    .values
                    .rename_references(&t.definition, target_type, old_id, new_id);
            }
            for scene in &mut signage.scenes {
                if let Ok(t) = templates.get_scene_template(&scene.template_id) {
                    changed |= scene
                        .values
                        .rename_references(&t.definition, target_type, old_id, new_id);
                }
            }
            if changed {
                dirty.push(signage_id.clone());
            }
        }
        for signage_id in dirty {
            self.save(&signage_id, templates)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Reference scans
    // ---------------------------------------------------------------------------

    /// Every frame or scene whose data points at `target_type/target_id`,
    /// keyed `signage/<id>.frame` / `signage/<id>.scene[<n>]`.
    pub fn value_references(
        &self,
        templates: &TemplateStore,
        target_type: &str,
        target_id: &str,
    ) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for (signage_id, signage) in &self.signages {
            if let Ok(t) = templates.get_frame_template(&signage.frame.template_id) {
                let fields =
                    signage
                        .frame
                        .values
                        .fields_referencing(&t.definition, target_type, target_id);
                if !fields.is_empty() {
                    referrers.insert(
                        format!("signage/{signage_id}.frame"),
                        format!("field '{}'", fields.join("', '")),
                    );
                }
            }
            for (index, scene) in signage.scenes.iter().enumerate() {
                if let Ok(t) = templates.get_scene_template(&scene.template_id) {
                    let fields =
                        scene
                            .values
                            .fields_referencing(&t.definition, target_type, target_id);
                    if !fields.is_empty() {
                        referrers.insert(
                            format!("signage/{signage_id}.scene[{index}]"),
                            format!("field '{}'", fields.join("', '")),
                        );
                    }
                }
            }
        }
        referrers
    }

    /// Every frame or scene instantiated from a template, keyed the same way
    /// as [`SignageManager::value_references`].
    pub fn template_references(&self, kind: TemplateKind, template_id: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for (signage_id, signage) in &self.signages {
            match kind {
                TemplateKind::Frame => {
                    if signage.frame.template_id == template_id {
                        referrers.insert(
                            format!("signage/{signage_id}.frame"),
                            "frame template".to_string(),
                        );
                    }
                }
                TemplateKind::Scene => {
                    for (index, scene) in signage.scenes.iter().enumerate() {
                        if scene.template_id == template_id {
                            referrers.insert(
                                format!("signage/{signage_id}.scene[{index}]"),
                                "scene template".to_string(),
                            );
                        }
                    }
                }
            }
        }
        referrers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
