//! Device backend assembly.

use std::path::Path;
use std::sync::Arc;

use tidepool_audio::prelude::*;
use tracing::{info, warn};

use crate::assets::{AssetLoader, DecodeFn};
use crate::audition::AuditionScript;
use crate::config::EngineConfig;

/// Rodio output with tracks decoded on the [`AssetLoader`] worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceBackend;

impl AudioBackend for DeviceBackend {
    type Sound = RodioSound;
    type Track = RodioTrack;
    type Stream = RodioStream;
    type Assets = AssetLoader<RodioTrack>;
}

/// Open the output device and build a mixer on it.
///
/// The returned device must outlive the mixer; dropping it silences every
/// buffer.
pub fn open_mixer(config: &EngineConfig) -> AudioResult<(RodioDevice, AudioMixer<DeviceBackend>)> {
    let device = RodioDevice::new()?;

    let decode: DecodeFn<RodioTrack> = Arc::new(|path: &Path| RodioTrack::decode(path));
    let assets = AssetLoader::new(&config.asset_root, decode);

    let mut mixer = AudioMixer::new(
        config.audio.clone(),
        assets,
        device.stream()?,
        device.stream()?,
        device.stream()?,
    );
    mixer.set_volumes(config.volume);

    info!("Mixer ready on {}", config.asset_root.display());
    Ok((device, mixer))
}

/// Decode the script's sound effects. Sounds that fail to load are skipped.
pub fn load_sounds(
    device: &RodioDevice,
    config: &EngineConfig,
    script: &AuditionScript,
) -> Vec<(String, RodioSound)> {
    script
        .sounds
        .iter()
        .filter_map(|entry| {
            match device.load_sound(config.asset_root.join(&entry.path)) {
                Ok(sound) => Some((entry.name.clone(), sound)),
                Err(e) => {
                    warn!("Skipping sound '{}': {}", entry.name, e);
                    None
                },
            }
        })
        .collect()
}
