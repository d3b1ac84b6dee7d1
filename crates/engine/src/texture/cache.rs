use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::decoder::{DecodeError, DecodeFuture, FileImageDecoder, ImageDecoder};
use super::tiling::{encode_png_data_url, tile_image, TilingError};
use super::{Texture, TextureScale};

/// Handle to a texture load. Clones share one underlying decode.
pub type TextureLoad = Shared<LocalBoxFuture<'static, Result<Rc<Texture>, TextureLoadError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load texture '{name}' from '{url}': {reason}")]
pub struct TextureLoadError {
    pub name: String,
    pub url: String,
    #[source]
    pub reason: DecodeError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} of {total} textures failed to load", .failures.len())]
pub struct TextureBatchError {
    pub total: usize,
    pub failures: Vec<TextureLoadError>,
}

struct InFlightLoad {
    load_id: u64,
    url: String,
    load: TextureLoad,
}

/// A name is either absent, pending in `in_flight`, or resolved in `images` + `urls`.
#[derive(Default)]
struct CacheState {
    images: HashMap<String, Rc<Texture>>,
    urls: HashMap<String, String>,
    in_flight: HashMap<String, InFlightLoad>,
}

/// Named texture registry that runs at most one decode per name at a time.
///
/// Single-threaded: every method takes `&self` and the state is never borrowed
/// across an await point, so loads can be driven while the cache is queried.
pub struct TextureCache {
    state: Rc<RefCell<CacheState>>,
    decoder: Box<dyn ImageDecoder>,
    next_load_id: Cell<u64>,
}

impl TextureCache {
    pub fn new(decoder: impl ImageDecoder + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(CacheState::default())),
            decoder: Box::new(decoder),
            next_load_id: Cell::new(0),
        }
    }

    pub fn with_asset_root(asset_root: impl Into<PathBuf>) -> Self {
        Self::new(FileImageDecoder::new(asset_root))
    }

    /// Resolves immediately for cached names and joins the pending load for names
    /// already in flight. A different `url` for either case is ignored.
    pub fn load_single(&self, name: &str, url: &str) -> TextureLoad {
        {
            let state = self.state.borrow();
            if let Some(texture) = state.images.get(name) {
                if let Some(cached_url) = state.urls.get(name).filter(|cached| *cached != url) {
                    warn!(
                        texture = name,
                        requested_url = url,
                        cached_url = cached_url.as_str(),
                        "texture_url_rebind_ignored"
                    );
                }
                return future::ready(Ok(Rc::clone(texture))).boxed_local().shared();
            }
            if let Some(pending) = state.in_flight.get(name) {
                if pending.url != url {
                    warn!(
                        texture = name,
                        requested_url = url,
                        pending_url = pending.url.as_str(),
                        "texture_url_rebind_ignored"
                    );
                }
                return pending.load.clone();
            }
        }

        let load_id = self.next_load_id.get();
        self.next_load_id.set(load_id.wrapping_add(1));
        debug!(texture = name, url, load_id, "texture_load_started");

        let decode = self.decoder.decode(url);
        let load = settle_load(
            Rc::downgrade(&self.state),
            name.to_string(),
            url.to_string(),
            load_id,
            decode,
        )
        .boxed_local()
        .shared();
        self.state.borrow_mut().in_flight.insert(
            name.to_string(),
            InFlightLoad {
                load_id,
                url: url.to_string(),
                load: load.clone(),
            },
        );
        load
    }

    /// Loads every entry and settles all of them before reporting. Fails when any
    /// single load failed, carrying every failure.
    pub fn load<I, N, U>(&self, textures: I) -> LocalBoxFuture<'static, Result<(), TextureBatchError>>
    where
        I: IntoIterator<Item = (N, U)>,
        N: AsRef<str>,
        U: AsRef<str>,
    {
        let loads = textures
            .into_iter()
            .map(|(name, url)| self.load_single(name.as_ref(), url.as_ref()))
            .collect::<Vec<_>>();
        let total = loads.len();
        async move {
            let failures = future::join_all(loads)
                .await
                .into_iter()
                .filter_map(Result::err)
                .collect::<Vec<_>>();
            if failures.is_empty() {
                Ok(())
            } else {
                Err(TextureBatchError { total, failures })
            }
        }
        .boxed_local()
    }

    pub fn get(&self, name: &str) -> Option<Rc<Texture>> {
        self.state.borrow().images.get(name).cloned()
    }

    pub fn get_url(&self, name: &str) -> Option<String> {
        self.state.borrow().urls.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.borrow().images.contains_key(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.state.borrow().in_flight.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_scale(&self, name: &str, target_width: f32, target_height: f32) -> Option<TextureScale> {
        let state = self.state.borrow();
        let texture = state.images.get(name)?;
        Some(TextureScale::fit(texture, target_width, target_height))
    }

    /// Repeats the named texture over a `width` x `height` raster and returns it as a
    /// PNG data url. `Ok(None)` when the name is not loaded.
    pub fn create_tiled_texture(
        &self,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<String>, TilingError> {
        let Some(texture) = self.get(name) else {
            return Ok(None);
        };
        let tiled = tile_image(texture.image(), width, height)?;
        encode_png_data_url(&tiled).map(Some)
    }

    /// Stores an already decoded texture, detaching any load still pending for `name`.
    pub fn insert(&self, name: &str, url: &str, texture: Texture) -> Rc<Texture> {
        let texture = Rc::new(texture);
        let mut state = self.state.borrow_mut();
        if state.in_flight.remove(name).is_some() {
            debug!(texture = name, "texture_pending_load_detached");
        }
        state.images.insert(name.to_string(), Rc::clone(&texture));
        state.urls.insert(name.to_string(), url.to_string());
        texture
    }

    /// Pending loads keep running for their waiters but no longer write into the cache.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        let images = state.images.len();
        let pending = state.in_flight.len();
        state.images.clear();
        state.urls.clear();
        state.in_flight.clear();
        info!(images, pending, "texture_cache_cleared");
    }
}

async fn settle_load(
    state: Weak<RefCell<CacheState>>,
    name: String,
    url: String,
    load_id: u64,
    decode: DecodeFuture,
) -> Result<Rc<Texture>, TextureLoadError> {
    let outcome = decode.await.map(Rc::new);

    let is_current = match state.upgrade() {
        Some(state) => {
            let mut state = state.borrow_mut();
            let is_current = state
                .in_flight
                .get(&name)
                .is_some_and(|pending| pending.load_id == load_id);
            if is_current {
                state.in_flight.remove(&name);
                if let Ok(texture) = &outcome {
                    state.images.insert(name.clone(), Rc::clone(texture));
                    state.urls.insert(name.clone(), url.clone());
                }
            }
            is_current
        }
        None => false,
    };

    match outcome {
        Ok(texture) => {
            if is_current {
                debug!(
                    texture = name.as_str(),
                    url = url.as_str(),
                    width = texture.width(),
                    height = texture.height(),
                    "texture_load_completed"
                );
            } else {
                debug!(
                    texture = name.as_str(),
                    url = url.as_str(),
                    load_id,
                    "texture_load_discarded_stale"
                );
            }
            Ok(texture)
        }
        Err(reason) => {
            warn!(
                texture = name.as_str(),
                url = url.as_str(),
                reason = %reason,
                "texture_load_failed"
            );
            Err(TextureLoadError { name, url, reason })
        }
    }
}
