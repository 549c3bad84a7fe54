use std::collections::HashMap;

use crate::client::PipelineClient;
use crate::transport::Transport;
use crate::types::{ImageFile, ImageSource, StoredImage};

/// Placeholder images offered when the service has none stored.
pub fn fallback_images() -> Vec<StoredImage> {
    (1..=3)
        .map(|i| {
            StoredImage::new(
                i,
                format!("https://picsum.photos/seed/humor-{}/800/600", i),
            )
        })
        .collect()
}

/// Stored images available for testing, with their last probed reachability.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    images: Vec<StoredImage>,
    access: HashMap<i64, bool>,
}

impl ImageCatalog {
    /// Build a catalog; falls back to [`fallback_images`] when `stored` is empty.
    pub fn new(stored: Vec<StoredImage>) -> Self {
        let images = if stored.is_empty() {
            fallback_images()
        } else {
            stored
        };
        Self {
            images,
            access: HashMap::new(),
        }
    }

    pub fn images(&self) -> &[StoredImage] {
        &self.images
    }

    /// Images whose URL is absolute http(s) and so can be offered at all.
    pub fn visible(&self) -> Vec<&StoredImage> {
        self.images
            .iter()
            .filter(|img| img.url.starts_with("http"))
            .collect()
    }

    pub fn get(&self, id: i64) -> Option<&StoredImage> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Last probe result for `id`; `None` if never probed.
    pub fn access(&self, id: i64) -> Option<bool> {
        self.access.get(&id).copied()
    }

    pub fn set_access(&mut self, id: i64, reachable: bool) {
        self.access.insert(id, reachable);
    }

    /// Probe every visible image concurrently and record the results.
    pub async fn refresh_access<T: Transport>(&mut self, client: &PipelineClient<T>) {
        let visible: Vec<(i64, String)> = self
            .visible()
            .into_iter()
            .map(|img| (img.id, img.url.clone()))
            .collect();
        let results = client
            .probe_all(visible.iter().map(|(_, url)| url.as_str()))
            .await;

        self.access = visible
            .iter()
            .zip(results)
            .map(|((id, _), ok)| (*id, ok))
            .collect();
        tracing::debug!(
            probed = self.access.len(),
            reachable = self.access.values().filter(|ok| **ok).count(),
            "refreshed image reachability"
        );
    }
}

/// The operator's current choice of inputs: one file, or stored images.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    file: Option<ImageFile>,
    image_ids: Vec<i64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a stored image in or out of the selection.
    ///
    /// Images the catalog knows to be unreachable cannot be selected; the
    /// call returns false and nothing changes. Otherwise any chosen file is
    /// cleared.
    pub fn toggle_image(&mut self, catalog: &ImageCatalog, id: i64) -> bool {
        if catalog.access(id) == Some(false) {
            return false;
        }
        if let Some(pos) = self.image_ids.iter().position(|i| *i == id) {
            self.image_ids.remove(pos);
        } else {
            self.image_ids.push(id);
        }
        self.file = None;
        true
    }

    /// Choose a file; clears the stored-image selection.
    pub fn set_file(&mut self, file: ImageFile) {
        self.file = Some(file);
        self.image_ids.clear();
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref()
    }

    pub fn image_ids(&self) -> &[i64] {
        &self.image_ids
    }

    /// Source for an invocation: the file if one is chosen, otherwise the
    /// selected images in the order they were selected.
    pub fn image_source(&self, catalog: &ImageCatalog) -> ImageSource {
        if let Some(file) = &self.file {
            return ImageSource::File(file.clone());
        }
        let images: Vec<StoredImage> = self
            .image_ids
            .iter()
            .filter_map(|id| catalog.get(*id).cloned())
            .collect();
        if images.is_empty() {
            ImageSource::None
        } else {
            ImageSource::Stored(images)
        }
    }
}
