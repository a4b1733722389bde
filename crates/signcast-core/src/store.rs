use crate::channel::{ChannelManager, CountHandler, RedirectHandler};
use crate::config::Config;
use crate::error::{ReferenceMap, Result, SigncastError};
use crate::media::MediaStore;
use crate::object_store::ObjectStore;
use crate::paths;
use crate::schedule::Schedule;
use crate::signage::{SignageManager, Transition};
use crate::template::TemplateStore;
use crate::value::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// The four managers under one roof, loaded bottom-up (types, values,
/// templates, signages, then channels) and the only place cross-manager
/// operations live: every delete is gated on the union of all managers'
/// reference scans, and every rename propagates to all referrers before the
/// old backing file is removed.
pub struct ContentStore {
    root: PathBuf,
    config: Config,
    media: MediaStore,
    objects: ObjectStore,
    templates: TemplateStore,
    signages: SignageManager,
    channels: ChannelManager,
}

impl ContentStore {
    pub fn load(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Self::load_with_config(root, config)
    }

    pub fn load_with_config(root: &Path, config: Config) -> Result<Self> {
        let media = MediaStore::new(config.image_root(root), config.video_root(root));
        let objects = ObjectStore::load(&config.data_root(root))?;
        let templates = TemplateStore::load(&config.template_root(root), &objects)?;
        let signages = SignageManager::load(&config.signage_root(root), &templates)?;
        let channels = ChannelManager::load(&config.channel_root(root), &signages)?;
        info!(root = %root.display(), "content store loaded");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            media,
            objects,
            templates,
            signages,
            channels,
        })
    }

    /// Create the directory skeleton for an empty content root.
    pub fn init(root: &Path) -> Result<Config> {
        let config = Config::default();
        config.save(root)?;
        for dir in [
            config.data_root(root),
            config.template_root(root).join("scene"),
            config.template_root(root).join("frame"),
            config.signage_root(root),
            config.channel_root(root),
            config.image_root(root),
            config.video_root(root),
        ] {
            crate::io::ensure_dir(&dir)?;
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn signages(&self) -> &SignageManager {
        &self.signages
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    // ---------------------------------------------------------------------------
    // Object operations
    // ---------------------------------------------------------------------------

    pub fn create_object_value(&mut self, type_id: &str, value_id: &str) -> Result<()> {
        self.objects.create_value(type_id, value_id)
    }

    pub fn set_object_field(
        &mut self,
        type_id: &str,
        value_id: &str,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        self.objects
            .set_field(&self.media, type_id, value_id, field_id, value)
    }

    pub fn set_object_fields(
        &mut self,
        type_id: &str,
        value_id: &str,
        updates: Vec<(String, Value)>,
    ) -> Result<()> {
        self.objects
            .set_fields(&self.media, type_id, value_id, updates)
    }

    /// Everything pointing at an object value, across managers.
    pub fn object_value_references(&self, type_id: &str, value_id: &str) -> ReferenceMap {
        let mut referrers = self.objects.value_references(type_id, value_id);
        referrers.extend(
            self.signages
                .value_references(&self.templates, type_id, value_id),
        );
        referrers
    }

    /// Rename an object value, rewriting every referrer first. The old
    /// backing file is removed only after propagation completes.
    pub fn rename_object_value(
        &mut self,
        type_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<()> {
        paths::validate_id(new_id)?;
        self.objects.get_value(type_id, old_id)?;
        if self.objects.has_value(type_id, new_id) {
            return Err(SigncastError::IdExists(new_id.to_string()));
        }
        self.objects.rename_references(type_id, old_id, new_id)?;
        self.signages
            .rename_references(&self.templates, type_id, old_id, new_id)?;
        self.objects.rename_value(type_id, old_id, new_id)
    }

    /// Delete an object value; refused with the complete referrer map while
    /// anything still points at it.
    pub fn remove_object_value(&mut self, type_id: &str, value_id: &str) -> Result<()> {
        self.objects.get_value(type_id, value_id)?;
        let referrers = self.object_value_references(type_id, value_id);
        if !referrers.is_empty() {
            return Err(SigncastError::ReferencesExist {
                target: format!("object/{type_id}.{value_id}"),
                referrers,
            });
        }
        self.objects.remove_value_unchecked(type_id, value_id)
    }

    /// Delete an object type; refused while other schemas, templates, or its
    /// own surviving instances depend on it.
    pub fn remove_object_type(&mut self, type_id: &str) -> Result<()> {
        self.objects.get_type(type_id)?;
        let mut referrers = self.objects.type_references(type_id);
        referrers.extend(self.templates.type_references(type_id));
        referrers.extend(self.objects.instances_of(type_id));
        if !referrers.is_empty() {
            return Err(SigncastError::ReferencesExist {
                target: format!("type/{type_id}"),
                referrers,
            });
        }
        self.objects.remove_type_unchecked(type_id)
    }

    // ---------------------------------------------------------------------------
    // Signage operations
    // ---------------------------------------------------------------------------

    pub fn create_signage(
        &mut self,
        signage_id: &str,
        title: &str,
        description: &str,
        frame_template_id: &str,
    ) -> Result<()> {
        self.signages
            .create_signage(&self.templates, signage_id, title, description, frame_template_id)
    }

    pub fn set_signage_title(&mut self, signage_id: &str, title: &str) -> Result<()> {
        self.signages.set_title(&self.templates, signage_id, title)
    }

    pub fn set_signage_description(&mut self, signage_id: &str, description: &str) -> Result<()> {
        self.signages
            .set_description(&self.templates, signage_id, description)
    }

    pub fn add_scene(&mut self, signage_id: &str, template_id: &str) -> Result<()> {
        self.signages.add_scene(&self.templates, signage_id, template_id)
    }

    pub fn remove_scene(&mut self, signage_id: &str, index: usize) -> Result<()> {
        self.signages.remove_scene(&self.templates, signage_id, index)
    }

    pub fn rearrange_scene(&mut self, signage_id: &str, a: usize, b: usize) -> Result<()> {
        self.signages
            .rearrange_scene(&self.templates, signage_id, a, b)
    }

    pub fn set_scene_duration(&mut self, signage_id: &str, index: usize, duration: i64) -> Result<()> {
        self.signages
            .set_scene_duration(&self.templates, signage_id, index, duration)
    }

    pub fn set_scene_transition(
        &mut self,
        signage_id: &str,
        index: usize,
        transition: Transition,
    ) -> Result<()> {
        self.signages
            .set_scene_transition(&self.templates, signage_id, index, transition)
    }

    pub fn set_scene_schedule(
        &mut self,
        signage_id: &str,
        index: usize,
        schedule: Schedule,
    ) -> Result<()> {
        self.signages
            .set_scene_schedule(&self.templates, signage_id, index, schedule)
    }

    pub fn set_scene_template(
        &mut self,
        signage_id: &str,
        index: usize,
        template_id: &str,
    ) -> Result<()> {
        self.signages
            .set_scene_template(&self.templates, signage_id, index, template_id)
    }

    pub fn set_scene_field(
        &mut self,
        signage_id: &str,
        index: usize,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        self.signages.set_scene_field(
            &self.templates,
            &self.objects,
            &self.media,
            signage_id,
            index,
            field_id,
            value,
        )
    }

    pub fn set_frame_field(&mut self, signage_id: &str, field_id: &str, value: Value) -> Result<()> {
        self.signages.set_frame_field(
            &self.templates,
            &self.objects,
            &self.media,
            signage_id,
            field_id,
            value,
        )
    }

    /// Rename a signage. Bound channels are rebound and their displays
    /// redirected before the old document is removed.
    pub fn rename_signage(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        paths::validate_id(new_id)?;
        self.signages.get_signage(old_id)?;
        if self.signages.has_signage(new_id) {
            return Err(SigncastError::IdExists(new_id.to_string()));
        }
        self.channels.rebind_signage(old_id, new_id)?;
        self.signages.rename_signage(&self.templates, old_id, new_id)
    }

    /// Delete a signage; refused while any channel is bound to it.
    pub fn remove_signage(&mut self, signage_id: &str) -> Result<()> {
        self.signages.get_signage(signage_id)?;
        let referrers = self.channels.signage_references(signage_id);
        if !referrers.is_empty() {
            return Err(SigncastError::ReferencesExist {
                target: format!("signage/{signage_id}"),
                referrers,
            });
        }
        self.signages.remove_signage_unchecked(signage_id)
    }

    // ---------------------------------------------------------------------------
    // Channel operations
    // ---------------------------------------------------------------------------

    pub fn create_channel(
        &mut self,
        channel_id: &str,
        description: &str,
        signage_id: &str,
    ) -> Result<()> {
        self.channels
            .create_channel(&self.signages, channel_id, description, signage_id)
    }

    pub fn set_channel_signage(&mut self, channel_id: &str, signage_id: &str) -> Result<()> {
        self.channels
            .set_signage(&self.signages, channel_id, signage_id)
    }

    pub fn set_channel_description(&mut self, channel_id: &str, description: &str) -> Result<()> {
        self.channels.set_description(channel_id, description)
    }

    pub fn rename_channel(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        self.channels.rename_channel(old_id, new_id)
    }

    pub fn remove_channel(&mut self, channel_id: &str) -> Result<()> {
        self.channels.remove_channel(channel_id)
    }

    pub fn set_redirect_handler(&mut self, handler: RedirectHandler) {
        self.channels.set_redirect_handler(handler);
    }

    pub fn set_count_handler(&mut self, handler: CountHandler) {
        self.channels.set_count_handler(handler);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
