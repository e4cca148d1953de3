//! End-to-end tests for the mixer.
//!
//! These drive [`AudioMixer`] over the headless backend the way a game loop
//! would and check the volumes each collaborator ends up with.

#![cfg(test)]

use crate::prelude::*;

struct Rig {
    mixer: AudioMixer<HeadlessBackend>,
    splash: HeadlessSound,
    splash_id: AssetId,
    bubbles: HeadlessSound,
    bubbles_id: AssetId,
}

fn rig() -> Rig {
    let assets = HeadlessAssets::new()
        .with_track("music/reef.ogg", 120.0)
        .with_track("music/trench.ogg", 120.0)
        .with_track("music/kelp.ogg", 90.0)
        .with_track("foley/surf.ogg", 30.0);
    let mut mixer = AudioMixer::new(
        MixerConfig::default(),
        assets,
        HeadlessStream::new(),
        HeadlessStream::new(),
        HeadlessStream::new(),
    );

    let splash = HeadlessSound::new("splash");
    let bubbles = HeadlessSound::new("bubbles");
    let splash_id = mixer.register_sound(splash.clone());
    let bubbles_id = mixer.register_sound(bubbles.clone());

    Rig {
        mixer,
        splash,
        splash_id,
        bubbles,
        bubbles_id,
    }
}

/// Sound effect lifecycle
mod sfx_tests {
    use super::*;

    #[test]
    fn e2e_same_key_replaces_previous_instance() {
        let mut rig = rig();

        assert!(rig.mixer.play_sound("k", rig.splash_id, false));
        rig.mixer.update();
        assert!(rig.mixer.play_sound("k", rig.bubbles_id, false));

        assert_eq!(rig.mixer.active_sounds(), 1, "Only one instance per key");
        let first = rig.splash.voices()[0];
        assert!(
            rig.splash.is_silenced(first),
            "First instance should be soft-stopped"
        );

        // the soft-stop happens before the replacement starts
        let events = rig.splash.events();
        assert!(matches!(
            events.last(),
            Some(VoiceEvent::SetVolume { volume, .. }) if volume.abs() < f32::EPSILON
        ));
        assert_eq!(rig.bubbles.voices().len(), 1);
    }

    #[test]
    fn e2e_frame_limit_drops_extra_sounds() {
        let mut rig = rig();

        assert!(rig.mixer.play_sound("a", rig.splash_id, false));
        assert!(rig.mixer.play_sound("b", rig.splash_id, false));
        assert!(
            !rig.mixer.play_sound("c", rig.splash_id, false),
            "Third sound in one frame should be dropped"
        );
        assert_eq!(rig.mixer.active_sounds(), 2);
        assert!(!rig.mixer.is_active("c"));

        rig.mixer.update();
        assert!(
            rig.mixer.play_sound("c", rig.splash_id, false),
            "Frame counter should reset on update"
        );
    }

    #[test]
    fn e2e_one_shot_expires_after_time_limit() {
        let mut rig = rig();
        rig.mixer.play_sound("k", rig.splash_id, false);

        for frame in 1..=120 {
            rig.mixer.update();
            assert!(rig.mixer.is_active("k"), "Still active after {frame} frames");
        }
        rig.mixer.update();
        assert!(!rig.mixer.is_active("k"), "Purged on frame 121");

        let voice = rig.splash.voices()[0];
        assert!(rig.splash.is_silenced(voice));
    }

    #[test]
    fn e2e_looping_sound_survives_until_stopped() {
        let mut rig = rig();
        rig.mixer.play_sound("loop", rig.bubbles_id, true);
        let voice = rig.bubbles.voices()[0];
        assert!(rig.bubbles.is_looping(voice));

        for _ in 0..1_000 {
            rig.mixer.update();
        }
        assert!(rig.mixer.is_active("loop"));

        rig.mixer.stop_sound("loop");
        assert!(!rig.mixer.is_active("loop"));
        assert!(rig.bubbles.is_silenced(voice));
    }

    #[test]
    fn e2e_stop_unknown_key_is_noop() {
        let mut rig = rig();
        rig.mixer.stop_sound("nothing");
        assert_eq!(rig.mixer.active_sounds(), 0);
        assert!(rig.splash.events().is_empty());
    }
}

/// Music envelopes
mod music_tests {
    use super::*;

    #[test]
    fn e2e_crossfade_lands_on_full_volume() {
        let mut rig = rig();
        rig.mixer.set_music_volume(0.8);
        rig.mixer.set_master_volume(0.5);
        rig.mixer.play_music("music/reef.ogg");

        rig.mixer.crossfade("music/trench.ogg");
        assert!(rig.mixer.music_envelope().crossfaded);

        for _ in 0..rig.mixer.config().crossfade_frames {
            rig.mixer.update();
        }

        assert!(!rig.mixer.music_envelope().crossfaded);
        assert!(!rig.mixer.crossfade_buffer().is_playing());
        assert_eq!(rig.mixer.crossfade_buffer().source_count(), 0);
        assert!((rig.mixer.music_output() - 0.4).abs() < 1e-6);
        assert_eq!(
            rig.mixer.currently_playing_track(),
            Some("music/trench.ogg")
        );
    }

    #[test]
    fn e2e_sidechain_ramps_linearly_without_overshoot() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");

        rig.mixer.sidechain();
        assert!((rig.mixer.music_output() - 0.5).abs() < 1e-6);

        let frames = rig.mixer.config().sidechain_frames;
        let step = 0.5 / frames as f32;
        let mut previous = rig.mixer.music_output();
        for frame in 1..frames {
            rig.mixer.update();
            let volume = rig.mixer.music_output();
            assert!((volume - previous - step).abs() < 1e-4, "Linear at frame {frame}");
            assert!(volume < 1.0, "Still ramping at frame {frame}");
            previous = volume;
        }

        rig.mixer.update();
        assert!((rig.mixer.music_output() - 1.0).abs() < f32::EPSILON);
        assert!(!rig.mixer.music_envelope().sidechained);
    }

    #[test]
    fn e2e_sound_with_sidechain_cuts_music() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");

        let options = SoundOptions::default().sidechain(true).volume(0.7);
        assert!(rig.mixer.play_sound_with("thud", rig.splash_id, options));

        let voice = rig.splash.voices()[0];
        assert!((rig.splash.volume(voice) - 0.7).abs() < 1e-6);
        assert!(rig.mixer.music_envelope().sidechained);
    }

    #[test]
    fn e2e_duck_waits_for_crossfade() {
        let mut ducking = rig();
        ducking.mixer.play_music("music/reef.ogg");
        ducking.mixer.crossfade("music/trench.ogg");

        ducking.mixer.set_duck_music(true);
        let mut ducked = Vec::new();
        let mut plain = Vec::new();

        let mut reference = rig();
        reference.mixer.play_music("music/reef.ogg");
        reference.mixer.crossfade("music/trench.ogg");

        for _ in 1..ducking.mixer.config().crossfade_frames {
            ducking.mixer.update();
            reference.mixer.update();
            ducked.push(ducking.mixer.music_output());
            plain.push(reference.mixer.music_output());
        }
        assert_eq!(ducked, plain, "Duck must not shape the crossfade");

        ducking.mixer.update();
        assert!((ducking.mixer.music_output() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn e2e_master_change_rescales_sidechain() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");
        rig.mixer.sidechain();

        rig.mixer.set_master_volume(0.2);
        assert!(
            (rig.mixer.music_output() - 0.1).abs() < 1e-6,
            "Cut music follows the new master"
        );

        let frames = rig.mixer.config().sidechain_frames;
        for frame in 0..frames {
            rig.mixer.update();
            assert!(
                rig.mixer.music_output() <= 0.2 + 1e-6,
                "Above music x master at frame {frame}"
            );
        }
        assert!((rig.mixer.music_output() - 0.2).abs() < 1e-6);
        assert!(!rig.mixer.music_envelope().sidechained);
    }

    #[test]
    fn e2e_master_change_rescales_crossfade() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");
        rig.mixer.crossfade("music/trench.ogg");
        rig.mixer.update();
        let outgoing = rig.mixer.crossfade_buffer().volume();

        rig.mixer.set_master_volume(0.1);
        assert!(
            (rig.mixer.crossfade_buffer().volume() - outgoing * 0.1).abs() < 1e-6,
            "Outgoing track follows the new master"
        );

        let frames = rig.mixer.config().crossfade_frames;
        for frame in 1..frames {
            rig.mixer.update();
            assert!(rig.mixer.crossfade_buffer().volume() <= 0.1 + 1e-6);
            assert!(
                rig.mixer.music_output() <= 0.1 + 1e-6,
                "Incoming track above music x master at frame {frame}"
            );
        }
        assert!(!rig.mixer.music_envelope().crossfaded);
        assert!((rig.mixer.music_output() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn e2e_config_change_keeps_running_crossfade() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");
        rig.mixer.crossfade("music/trench.ogg");
        for _ in 0..10 {
            rig.mixer.update();
        }

        let mut config = rig.mixer.config().clone();
        config.crossfade_frames = 30;
        rig.mixer.set_config(config);

        let mut previous = rig.mixer.music_output();
        let mut largest = 0.0_f32;
        for _ in 10..90 {
            rig.mixer.update();
            largest = largest.max(rig.mixer.music_output() - previous);
            previous = rig.mixer.music_output();
        }
        assert!(!rig.mixer.music_envelope().crossfaded);
        assert!(largest < 0.05, "Fade-in jumped by {largest}");
    }

    #[test]
    fn e2e_replaying_current_track_changes_nothing() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");
        for _ in 0..10 {
            rig.mixer.update();
        }
        let position = rig.mixer.music_buffer().current();
        let sources = rig.mixer.music_buffer().source_count();
        let stops = rig.mixer.music_buffer().stop_count();

        rig.mixer.play_music("music/reef.ogg");

        assert_eq!(rig.mixer.music_buffer().current(), position);
        assert_eq!(rig.mixer.music_buffer().source_count(), sources);
        assert_eq!(rig.mixer.music_buffer().stop_count(), stops);
    }

    #[test]
    fn e2e_preloaded_track_plays_without_sync_load() {
        let mut rig = rig();
        rig.mixer.preload_music("music/kelp.ogg");
        rig.mixer.assets_mut().update(std::time::Duration::from_millis(4));
        rig.mixer.update();

        rig.mixer.play_loaded_music("music/kelp.ogg");
        assert_eq!(rig.mixer.currently_playing_track(), Some("music/kelp.ogg"));
    }

    #[test]
    fn e2e_stop_music_mid_crossfade() {
        let mut rig = rig();
        rig.mixer.play_music("music/reef.ogg");
        rig.mixer.crossfade("music/trench.ogg");
        rig.mixer.update();

        rig.mixer.stop_music();
        assert!(!rig.mixer.is_music_playing());
        assert!(!rig.mixer.music_envelope().crossfaded);
        assert_eq!(rig.mixer.crossfade_buffer().source_count(), 0);
        assert_eq!(rig.mixer.currently_playing_track(), None);
    }
}

/// Foley and global volume
mod foley_tests {
    use super::*;

    #[test]
    fn e2e_foley_never_exceeds_sound_ceiling() {
        let mut rig = rig();
        rig.mixer.set_sound_volume(0.3);
        rig.mixer.set_master_volume(0.9);
        rig.mixer.play_foley("foley/surf.ogg");

        let ceiling = 0.3 * 0.9;
        for _ in 0..rig.mixer.config().foley_period_frames {
            rig.mixer.update();
            assert!(rig.mixer.foley_buffer().volume() <= ceiling + 1e-6);
        }
    }

    #[test]
    fn e2e_fade_out_foley_stops_layer() {
        let mut rig = rig();
        rig.mixer.play_foley("foley/surf.ogg");
        rig.mixer.fade_out_foley();

        for _ in 0..rig.mixer.config().foley_fade_frames {
            rig.mixer.update();
        }
        assert!(!rig.mixer.is_foley_playing());
        assert_eq!(rig.mixer.foley_buffer().source_count(), 0);
    }

    #[test]
    fn e2e_sound_change_caps_foley_at_once() {
        let mut rig = rig();
        rig.mixer.play_foley("foley/surf.ogg");
        for _ in 0..20 {
            rig.mixer.update();
        }

        let swing = rig.mixer.foley_buffer().volume();
        assert!(swing > 0.2);

        rig.mixer.set_sound_volume(0.2);
        assert!(rig.mixer.foley_buffer().volume() <= 0.2 + 1e-6);
        assert!((rig.mixer.foley_buffer().volume() - swing * 0.2).abs() < 1e-6);
    }

    #[test]
    fn e2e_master_change_rescales_foley_fade() {
        let mut rig = rig();
        rig.mixer.play_foley("foley/surf.ogg");
        rig.mixer.fade_out_foley();
        for _ in 0..10 {
            rig.mixer.update();
        }
        let fading = rig.mixer.foley_buffer().volume();

        rig.mixer.set_master_volume(0.5);
        assert!((rig.mixer.foley_buffer().volume() - fading * 0.5).abs() < 1e-6);

        let mut previous = rig.mixer.foley_buffer().volume();
        while rig.mixer.is_foley_playing() {
            rig.mixer.update();
            let volume = rig.mixer.foley_buffer().volume();
            assert!(volume <= previous + 1e-6, "Fade must keep falling");
            previous = volume;
        }
    }

    #[test]
    fn e2e_mute_silences_every_section() {
        let mut rig = rig();
        rig.mixer.play_sound("loop", rig.bubbles_id, true);
        rig.mixer.play_music("music/reef.ogg");
        rig.mixer.play_foley("foley/surf.ogg");
        rig.mixer.sidechain();

        rig.mixer.set_sound_active(false);
        assert!(!rig.mixer.is_sound_active());

        for _ in 0..30 {
            rig.mixer.update();
            assert!(rig.mixer.music_output().abs() < f32::EPSILON);
            assert!(rig.mixer.foley_buffer().volume().abs() < f32::EPSILON);
        }
        let voice = rig.bubbles.voices()[0];
        assert!(rig.bubbles.volume(voice).abs() < f32::EPSILON);

        rig.mixer.crossfade("music/trench.ogg");
        for _ in 0..30 {
            rig.mixer.update();
            assert!(rig.mixer.crossfade_buffer().volume().abs() < f32::EPSILON);
        }

        assert!(rig.mixer.play_sound("hit", rig.splash_id, false));
        let hit = rig.splash.voices()[0];
        assert!(rig.splash.volume(hit).abs() < f32::EPSILON);

        rig.mixer.set_sound_active(true);
        assert!((rig.bubbles.volume(voice) - 1.0).abs() < 1e-6);
    }
}
