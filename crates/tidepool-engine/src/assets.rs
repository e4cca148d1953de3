//! Background track loader.
//!
//! Decoding runs on one worker thread fed through a `crossbeam-channel`
//! queue. Completed tracks are collected on the game thread, either in
//! [`update`](AssetStore::update) within a time budget or by blocking in
//! [`finish_loading`](AssetStore::finish_loading).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tidepool_audio::prelude::*;
use tracing::{debug, warn};

/// Decodes the file at a path into a track.
pub type DecodeFn<T> = Arc<dyn Fn(&Path) -> AudioResult<T> + Send + Sync>;

enum Slot<T> {
    Pending,
    Ready(T),
}

/// Asset store that decodes tracks on a worker thread.
pub struct AssetLoader<T> {
    requests: Option<Sender<String>>,
    completions: Receiver<(String, AudioResult<T>)>,
    tracks: HashMap<String, Slot<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T> std::fmt::Debug for AssetLoader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("tracks", &self.tracks.len())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl<T: TrackData + Send + 'static> AssetLoader<T> {
    /// Start a loader resolving paths against `root`.
    pub fn new(root: impl Into<PathBuf>, decode: DecodeFn<T>) -> Self {
        let root = root.into();
        let (request_tx, request_rx) = unbounded::<String>();
        let (done_tx, done_rx) = unbounded();

        let worker = thread::Builder::new()
            .name("tidepool-assets".to_string())
            .spawn(move || {
                for path in request_rx {
                    let result = decode(&root.join(&path));
                    if done_tx.send((path, result)).is_err() {
                        break;
                    }
                }
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not start asset worker: {}", e);
                None
            },
        };

        Self {
            requests: Some(request_tx),
            completions: done_rx,
            tracks: HashMap::new(),
            worker,
        }
    }

    /// Loads still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracks
            .values()
            .filter(|slot| matches!(slot, Slot::Pending))
            .count()
    }

    fn complete(&mut self, path: &str, result: AudioResult<T>) -> AudioResult<()> {
        match result {
            Ok(track) => {
                debug!("Loaded track '{}'", path);
                self.tracks.insert(path.to_string(), Slot::Ready(track));
                Ok(())
            },
            Err(e) => {
                warn!("Failed to load track '{}': {}", path, e);
                self.tracks.remove(path);
                Err(e)
            },
        }
    }
}

impl<T: TrackData + Send + 'static> AssetStore for AssetLoader<T> {
    type Track = T;

    fn load(&mut self, path: &str) {
        if self.tracks.contains_key(path) {
            return;
        }
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|tx| tx.send(path.to_string()).is_ok());
        if sent {
            self.tracks.insert(path.to_string(), Slot::Pending);
        } else {
            warn!("Asset worker is gone, cannot load '{}'", path);
        }
    }

    fn is_loaded(&self, path: &str) -> bool {
        matches!(self.tracks.get(path), Some(Slot::Ready(_)))
    }

    fn finish_loading(&mut self, path: &str) -> AudioResult<()> {
        self.load(path);
        loop {
            match self.tracks.get(path) {
                Some(Slot::Ready(_)) => return Ok(()),
                Some(Slot::Pending) => {},
                None => return Err(AudioError::NotLoaded(path.to_string())),
            }

            let Ok((done, result)) = self.completions.recv() else {
                return Err(AudioError::NotLoaded(path.to_string()));
            };
            let outcome = self.complete(&done, result);
            if done == path {
                return outcome;
            }
        }
    }

    fn get(&self, path: &str) -> Option<T> {
        match self.tracks.get(path) {
            Some(Slot::Ready(track)) => Some(track.clone()),
            _ => None,
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.tracks.contains_key(path)
    }

    fn update(&mut self, budget: Duration) -> bool {
        let start = Instant::now();
        while let Ok((path, result)) = self.completions.try_recv() {
            let _ = self.complete(&path, result);
            if start.elapsed() >= budget {
                break;
            }
        }
        self.pending() == 0
    }
}

impl<T> Drop for AssetLoader<T> {
    fn drop(&mut self) {
        // Closing the request queue ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Asset worker panicked");
            }
        }
    }
}
