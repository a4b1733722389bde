use crate::error::{ReferenceMap, Result, SigncastError};
use crate::paths;
use crate::signage::SignageManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A named display binding to exactly one signage.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    id: String,
    pub description: String,
    signage_id: String,
}

impl Channel {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn signage_id(&self) -> &str {
        &self.signage_id
    }
}

#[derive(Serialize, Deserialize)]
struct ChannelDoc {
    description: String,
    signage: String,
}

// ---------------------------------------------------------------------------
// ChannelManager
// ---------------------------------------------------------------------------

/// Called when a display should redirect or refresh: `(channel, old_id)`,
/// where `old_id` is the id the display is currently pointed at.
pub type RedirectHandler = Box<dyn Fn(&Channel, &str)>;

/// Called to ask the delivery layer how many displays are connected.
pub type CountHandler = Box<dyn Fn(&Channel) -> usize>;

/// Channels under one root, one JSON document per channel. The delivery
/// layer injects the two callbacks; this manager never touches transport.
#[derive(Default)]
pub struct ChannelManager {
    root: PathBuf,
    channels: BTreeMap<String, Channel>,
    redirect_handler: Option<RedirectHandler>,
    count_handler: Option<CountHandler>,
}

impl ChannelManager {
    pub fn load(root: &Path, signages: &SignageManager) -> Result<Self> {
        let mut manager = Self {
            root: root.to_path_buf(),
            ..Self::default()
        };
        if !root.exists() {
            return Ok(manager);
        }
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(channel_id) = name.strip_suffix(".json") else {
                continue;
            };
            paths::validate_id(channel_id)?;
            let data = std::fs::read_to_string(entry.path())?;
            let doc: ChannelDoc = serde_json::from_str(&data)?;
            signages.get_signage(&doc.signage)?;
            info!(channel_id, signage = %doc.signage, "channel loaded");
            manager.channels.insert(
                channel_id.to_string(),
                Channel {
                    id: channel_id.to_string(),
                    description: doc.description,
                    signage_id: doc.signage,
                },
            );
        }
        Ok(manager)
    }

    fn save(&self, channel_id: &str) -> Result<()> {
        let channel = self.get_channel(channel_id)?;
        let doc = ChannelDoc {
            description: channel.description.clone(),
            signage: channel.signage_id.clone(),
        };
        let path = paths::channel_file(&self.root, channel_id);
        let data = serde_json::to_string_pretty(&doc)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        debug!(channel_id, "channel saved");
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Delivery-layer wiring
    // ---------------------------------------------------------------------------

    pub fn set_redirect_handler(&mut self, handler: RedirectHandler) {
        self.redirect_handler = Some(handler);
    }

    pub fn set_count_handler(&mut self, handler: CountHandler) {
        self.count_handler = Some(handler);
    }

    fn fire_redirect(&self, channel: &Channel, old_id: &str) {
        if let Some(handler) = &self.redirect_handler {
            handler(channel, old_id);
        }
    }

    /// Ask connected displays to re-fetch the channel's current content.
    pub fn request_refresh(&self, channel_id: &str) -> Result<()> {
        let channel = self.get_channel(channel_id)?;
        self.fire_redirect(channel, channel_id);
        Ok(())
    }

    /// Number of displays the delivery layer reports for this channel;
    /// zero when no delivery layer is attached.
    pub fn connection_count(&self, channel_id: &str) -> Result<usize> {
        let channel = self.get_channel(channel_id)?;
        Ok(self.count_handler.as_ref().map_or(0, |h| h(channel)))
    }

    // ---------------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------------

    pub fn get_channel(&self, channel_id: &str) -> Result<&Channel> {
        self.channels
            .get(channel_id)
            .ok_or_else(|| SigncastError::ChannelNotFound(channel_id.to_string()))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Every channel bound to `signage_id`, keyed `channel/<id>`. Consumed
    /// by the reference index to refuse deleting a live signage.
    pub fn signage_references(&self, signage_id: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for channel in self.channels.values() {
            if channel.signage_id == signage_id {
                referrers.insert(format!("channel/{}", channel.id), "bound signage".to_string());
            }
        }
        referrers
    }

    // ---------------------------------------------------------------------------
    // Mutation gateways
    // ---------------------------------------------------------------------------

    pub fn create_channel(
        &mut self,
        signages: &SignageManager,
        channel_id: &str,
        description: &str,
        signage_id: &str,
    ) -> Result<()> {
        paths::validate_id(channel_id)?;
        if self.channels.contains_key(channel_id) {
            return Err(SigncastError::IdExists(channel_id.to_string()));
        }
        signages.get_signage(signage_id)?;
        self.channels.insert(
            channel_id.to_string(),
            Channel {
                id: channel_id.to_string(),
                description: description.to_string(),
                signage_id: signage_id.to_string(),
            },
        );
        self.save(channel_id)
    }

    pub fn set_description(&mut self, channel_id: &str, description: &str) -> Result<()> {
        self.get_channel(channel_id)?;
        if let Some(channel) = self.channels.get_mut(channel_id) {
            channel.description = description.to_string();
        }
        self.save(channel_id)
    }

    /// Swap the bound signage and request a refresh from connected displays.
    pub fn set_signage(
        &mut self,
        signages: &SignageManager,
        channel_id: &str,
        signage_id: &str,
    ) -> Result<()> {
        signages.get_signage(signage_id)?;
        self.get_channel(channel_id)?;
        if let Some(channel) = self.channels.get_mut(channel_id) {
            channel.signage_id = signage_id.to_string();
        }
        self.save(channel_id)?;
        self.request_refresh(channel_id)
    }

    /// Re-key a channel; connected displays are redirected from the old id.
    pub fn rename_channel(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        paths::validate_id(new_id)?;
        if self.channels.contains_key(new_id) {
            return Err(SigncastError::IdExists(new_id.to_string()));
        }
        let mut channel = self.get_channel(old_id)?.clone();
        channel.id = new_id.to_string();
        self.channels.remove(old_id);
        self.channels.insert(new_id.to_string(), channel);
        self.save(new_id)?;
        let old_path = paths::channel_file(&self.root, old_id);
        if old_path.exists() {
            std::fs::remove_file(old_path)?;
        }
        if let Ok(channel) = self.get_channel(new_id) {
            self.fire_redirect(channel, old_id);
        }
        Ok(())
    }

    /// Channels are leaves in the reference graph: nothing points at them,
    /// so removal needs no index check.
    pub fn remove_channel(&mut self, channel_id: &str) -> Result<()> {
        self.get_channel(channel_id)?;
        self.channels.remove(channel_id);
        let path = paths::channel_file(&self.root, channel_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Rebind every channel pointing at `old_signage_id`, persisting each and
    /// redirecting its displays. Runs before the signage's old document is
    /// removed so no channel is ever left pointing at a vanished id.
    pub(crate) fn rebind_signage(&mut self, old_signage_id: &str, new_signage_id: &str) -> Result<()> {
        let bound: Vec<String> = self
            .channels
            .values()
            .filter(|c| c.signage_id == old_signage_id)
            .map(|c| c.id.clone())
            .collect();
        for channel_id in bound {
            if let Some(channel) = self.channels.get_mut(&channel_id) {
                channel.signage_id = new_signage_id.to_string();
            }
            self.save(&channel_id)?;
            self.request_refresh(&channel_id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn signage_fixture(root: &Path) -> (SignageManager, TemplateStore) {
        let template_root = root.join("template");
        let frame_dir = template_root.join("frame/plain");
        std::fs::create_dir_all(&frame_dir).unwrap();
        std::fs::write(
            frame_dir.join("manifest.json"),
            r#"{"fields": {"footer": ["Footer", "", "str"]}}"#,
        )
        .unwrap();
        let objects = crate::object_store::ObjectStore::default();
        let templates = TemplateStore::load(&template_root, &objects).unwrap();

        let signage_root = root.join("signage");
        let mut signages = SignageManager::load(&signage_root, &templates).unwrap();
        signages
            .create_signage(&templates, "default_signage", "Default", "", "plain")
            .unwrap();
        signages
            .create_signage(&templates, "weekend_signage", "Weekend", "", "plain")
            .unwrap();
        (signages, templates)
    }

    #[test]
    fn create_set_and_reload() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let channel_root = dir.path().join("channel");

        let mut channels = ChannelManager::load(&channel_root, &signages).unwrap();
        channels
            .create_channel(&signages, "default_channel", "Entrance screen", "default_signage")
            .unwrap();
        channels
            .set_signage(&signages, "default_channel", "weekend_signage")
            .unwrap();

        let reloaded = ChannelManager::load(&channel_root, &signages).unwrap();
        assert_eq!(
            reloaded.get_channel("default_channel").unwrap().signage_id(),
            "weekend_signage"
        );
    }

    #[test]
    fn binding_unknown_signage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let mut channels =
            ChannelManager::load(&dir.path().join("channel"), &signages).unwrap();
        assert!(channels
            .create_channel(&signages, "c", "", "no_such_signage")
            .is_err());
        channels
            .create_channel(&signages, "c", "", "default_signage")
            .unwrap();
        assert!(channels
            .set_signage(&signages, "c", "no_such_signage")
            .is_err());
    }

    #[test]
    fn redirect_fires_on_signage_swap_and_rename() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let mut channels =
            ChannelManager::load(&dir.path().join("channel"), &signages).unwrap();
        channels
            .create_channel(&signages, "default_channel", "", "default_signage")
            .unwrap();

        let events: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        channels.set_redirect_handler(Box::new(move |channel, old_id| {
            sink.borrow_mut()
                .push((channel.id().to_string(), old_id.to_string()));
        }));

        channels
            .set_signage(&signages, "default_channel", "weekend_signage")
            .unwrap();
        channels.rename_channel("default_channel", "front_door").unwrap();

        let events = events.borrow();
        assert_eq!(events[0], ("default_channel".into(), "default_channel".into()));
        assert_eq!(events[1], ("front_door".into(), "default_channel".into()));
    }

    #[test]
    fn connection_count_defaults_to_zero() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let mut channels =
            ChannelManager::load(&dir.path().join("channel"), &signages).unwrap();
        channels
            .create_channel(&signages, "default_channel", "", "default_signage")
            .unwrap();

        assert_eq!(channels.connection_count("default_channel").unwrap(), 0);
        channels.set_count_handler(Box::new(|_channel| 3));
        assert_eq!(channels.connection_count("default_channel").unwrap(), 3);
    }

    #[test]
    fn signage_references_list_bound_channels() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let mut channels =
            ChannelManager::load(&dir.path().join("channel"), &signages).unwrap();
        channels
            .create_channel(&signages, "a", "", "default_signage")
            .unwrap();
        channels
            .create_channel(&signages, "b", "", "default_signage")
            .unwrap();
        channels
            .create_channel(&signages, "c", "", "weekend_signage")
            .unwrap();

        let refs = channels.signage_references("default_signage");
        assert_eq!(refs.len(), 2);
        assert!(refs.contains_key("channel/a"));
        assert!(refs.contains_key("channel/b"));
    }

    #[test]
    fn remove_channel_deletes_document() {
        let dir = TempDir::new().unwrap();
        let (signages, _templates) = signage_fixture(dir.path());
        let channel_root = dir.path().join("channel");
        let mut channels = ChannelManager::load(&channel_root, &signages).unwrap();
        channels
            .create_channel(&signages, "a", "", "default_signage")
            .unwrap();

        channels.remove_channel("a").unwrap();
        assert!(channels.get_channel("a").is_err());
        assert!(!channel_root.join("a.json").exists());
    }
}
