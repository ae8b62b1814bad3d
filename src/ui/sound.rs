/// Audio service: procedural chimes and a background loop via rodio.
///
/// Constructed explicitly with `AudioService::init` and shut down with
/// `dispose`; the main loop hands a reference to whoever plays sounds.
/// Effects are generated as in-memory WAV buffers at init time and
/// played fire-and-forget. The background loop is either the configured
/// track or a generated music-box tune.
///
/// Compile without the "sound" feature to disable audio entirely (the
/// stub backend never opens a device).

use std::path::{Path, PathBuf};

use crate::config::AudioConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sfx {
    Click,
    Pop,
    Flip,
    Match,
    Miss,
    Reveal,
    Complete,
    Transition,
    Fanfare,
}

#[cfg(feature = "sound")]
mod inner {
    use std::fs::File;
    use std::io::{BufReader, Cursor};
    use std::path::Path;
    use std::sync::Arc;

    use rodio::buffer::SamplesBuffer;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    pub struct Backend {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        volume: f32,
        music: Option<Sink>,
        sfx_click: Arc<Vec<u8>>,
        sfx_pop: Arc<Vec<u8>>,
        sfx_flip: Arc<Vec<u8>>,
        sfx_match: Arc<Vec<u8>>,
        sfx_miss: Arc<Vec<u8>>,
        sfx_reveal: Arc<Vec<u8>>,
        sfx_complete: Arc<Vec<u8>>,
        sfx_transition: Arc<Vec<u8>>,
        sfx_fanfare: Arc<Vec<u8>>,
    }

    impl Backend {
        pub fn open(volume: f32, track: Option<&Path>) -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("no audio device: {e}");
                    return None;
                }
            };

            let music = Sink::try_new(&handle).ok().map(|sink| {
                sink.set_volume(volume);
                match track.map(open_track) {
                    Some(Ok(src)) => sink.append(src.repeat_infinite()),
                    Some(Err(e)) => {
                        log::warn!("background track unusable ({e}), using built-in tune");
                        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, gen_music_box()).repeat_infinite());
                    }
                    None => {
                        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, gen_music_box()).repeat_infinite());
                    }
                }
                sink
            });

            Some(Backend {
                _stream: stream,
                handle,
                volume,
                music,
                sfx_click: Arc::new(make_wav(&gen_blip(880.0, 0.03, 0.2))),
                sfx_pop: Arc::new(make_wav(&gen_pop())),
                sfx_flip: Arc::new(make_wav(&gen_flip())),
                sfx_match: Arc::new(make_wav(&gen_chime(&[(784.0, 0.07), (1047.0, 0.14)]))),
                sfx_miss: Arc::new(make_wav(&gen_chime(&[(392.0, 0.08), (330.0, 0.12)]))),
                sfx_reveal: Arc::new(make_wav(&gen_blip(660.0, 0.05, 0.15))),
                sfx_complete: Arc::new(make_wav(&gen_chime(&[(523.0, 0.08), (659.0, 0.08), (784.0, 0.16)]))),
                sfx_transition: Arc::new(make_wav(&gen_sweep())),
                sfx_fanfare: Arc::new(make_wav(&gen_fanfare())),
            })
        }

        pub fn play(&self, sfx: Sfx) {
            let buf = match sfx {
                Sfx::Click => &self.sfx_click,
                Sfx::Pop => &self.sfx_pop,
                Sfx::Flip => &self.sfx_flip,
                Sfx::Match => &self.sfx_match,
                Sfx::Miss => &self.sfx_miss,
                Sfx::Reveal => &self.sfx_reveal,
                Sfx::Complete => &self.sfx_complete,
                Sfx::Transition => &self.sfx_transition,
                Sfx::Fanfare => &self.sfx_fanfare,
            };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn set_music_paused(&self, paused: bool) {
            if let Some(sink) = &self.music {
                if paused { sink.pause() } else { sink.play() }
            }
        }

        pub fn stop_music(&mut self) {
            if let Some(sink) = self.music.take() {
                sink.stop();
            }
        }

        /// Replace the background loop with `path`. The old loop keeps
        /// playing when the track cannot be opened.
        pub fn switch_music(&mut self, path: &Path, paused: bool) -> bool {
            let src = match open_track(path) {
                Ok(src) => src,
                Err(e) => {
                    log::warn!("stage track {} unusable: {e}", path.display());
                    return false;
                }
            };
            let Ok(sink) = Sink::try_new(&self.handle) else { return false };
            sink.set_volume(self.volume);
            sink.append(src.repeat_infinite());
            if paused {
                sink.pause();
            }
            if let Some(old) = self.music.replace(sink) {
                old.stop();
            }
            true
        }
    }

    fn open_track(path: &Path) -> Result<Decoder<BufReader<File>>, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        Ok(Decoder::new(BufReader::new(file))?)
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn gen_blip(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32);
                (t * freq * TAU).sin() * env * volume
            })
            .collect()
    }

    /// Sequence of (frequency, seconds) notes with a bell-like decay.
    fn gen_chime(notes: &[(f32, f32)]) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in notes {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
                samples.push(wave * env * 0.3);
            }
        }
        samples
    }

    /// Balloon pop: very short noise burst over a falling tone.
    fn gen_pop() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.07) as usize;
        let mut rng: u32 = 2024;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 900.0 - t * 600.0;
                let ti = i as f32 / SAMPLE_RATE as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let env = (1.0 - t).powf(2.0);
                ((ti * freq * TAU).sin() * 0.4 + noise * 0.6) * env * 0.35
            })
            .collect()
    }

    /// Card flip: quick upward chirp.
    fn gen_flip() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.05) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 400.0 + t * 500.0;
                let ti = i as f32 / SAMPLE_RATE as f32;
                (ti * freq * TAU).sin() * (1.0 - t) * 0.2
            })
            .collect()
    }

    /// Stage change: soft rising sweep.
    fn gen_sweep() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.18) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 300.0 + t * 700.0;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let env = (t * std::f32::consts::PI).sin();
                (ti * freq * TAU).sin() * env * 0.15
            })
            .collect()
    }

    /// "Happy birthday" opening phrase.
    fn gen_fanfare() -> Vec<f32> {
        // G4 G4 A4 G4 C5 B4
        let notes = [
            (392.0_f32, 0.15), (392.0, 0.1), (440.0, 0.3),
            (392.0, 0.3), (523.0, 0.3), (494.0, 0.5),
        ];
        let mut samples = Vec::new();
        for &(freq, dur) in &notes {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.4;
                let wave = (t * freq * TAU).sin() * 0.6
                    + (t * freq * 2.0 * TAU).sin() * 0.3
                    + (t * freq * 3.0 * TAU).sin() * 0.1;
                samples.push(wave * env * 0.3);
            }
        }
        samples
    }

    /// Background loop: slow music-box arpeggio over C, A minor, F, G.
    fn gen_music_box() -> Vec<f32> {
        let chords: [[f32; 4]; 4] = [
            [523.0, 659.0, 784.0, 659.0],
            [440.0, 523.0, 659.0, 523.0],
            [349.0, 440.0, 523.0, 440.0],
            [392.0, 494.0, 587.0, 494.0],
        ];
        let note_dur = 0.25;
        let mut samples = Vec::new();
        for chord in &chords {
            for _ in 0..2 {
                for &freq in chord {
                    let n = (SAMPLE_RATE as f32 * note_dur) as usize;
                    for i in 0..n {
                        let t = i as f32 / SAMPLE_RATE as f32;
                        let env = (-(i as f32 / n as f32) * 3.0).exp();
                        let wave = (t * freq * TAU).sin() * 0.8 + (t * freq * 4.0 * TAU).sin() * 0.2;
                        samples.push(wave * env * 0.2);
                    }
                }
            }
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wav_header_matches_sample_count() {
            let wav = make_wav(&gen_blip(440.0, 0.01, 0.5));
            let n = (SAMPLE_RATE as f32 * 0.01) as usize;
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(&wav[8..12], b"WAVE");
            assert_eq!(wav.len(), 44 + n * 2);
        }
    }
}

#[cfg(not(feature = "sound"))]
mod inner {
    use std::path::Path;

    use super::Sfx;

    pub struct Backend;

    impl Backend {
        pub fn open(_volume: f32, _track: Option<&Path>) -> Option<Self> { None }
        pub fn play(&self, _sfx: Sfx) {}
        pub fn set_music_paused(&self, _paused: bool) {}
        pub fn stop_music(&mut self) {}
        pub fn switch_music(&mut self, _path: &Path, _paused: bool) -> bool { false }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API
// ════════════════════════════════════════════════════════════

pub struct AudioService {
    backend: Option<inner::Backend>,
    muted: bool,
    music_stopped: bool,
    /// Stage track currently looping, if one replaced the default.
    track: Option<PathBuf>,
}

impl AudioService {
    /// Open the output device. Without one the service stays silent.
    pub fn init(cfg: &AudioConfig) -> Self {
        let backend = inner::Backend::open(cfg.volume, cfg.background_track.as_deref());
        let service = AudioService { backend, muted: cfg.muted, music_stopped: false, track: None };
        service.apply_mute();
        if service.backend.is_some() {
            log::info!("audio ready (muted: {})", service.muted);
        }
        service
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn play(&self, sfx: Sfx) {
        if let Some(b) = &self.backend {
            b.play(sfx);
        }
    }

    /// Toggle the background music. Returns the new muted state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.apply_mute();
        self.muted
    }

    /// Stop the background loop for good (the closing letter).
    pub fn stop_music(&mut self) {
        if self.music_stopped {
            return;
        }
        self.music_stopped = true;
        if let Some(b) = &mut self.backend {
            b.stop_music();
        }
    }

    /// Loop a stage's own track. Returns true when the track changed.
    /// Nothing plays again once the music was stopped.
    pub fn play_stage_track(&mut self, path: &Path) -> bool {
        if self.music_stopped || self.track.as_deref() == Some(path) {
            return false;
        }
        let muted = self.muted;
        let switched = self.backend.as_mut().is_some_and(|b| b.switch_music(path, muted));
        if switched {
            log::info!("stage track {}", path.display());
            self.track = Some(path.to_path_buf());
        }
        switched
    }

    pub fn dispose(&mut self) {
        self.stop_music();
        self.backend = None;
    }

    fn apply_mute(&self) {
        if let Some(b) = &self.backend {
            b.set_music_paused(self.muted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent() -> AudioService {
        AudioService { backend: None, muted: true, music_stopped: true, track: None }
    }

    #[test]
    fn silent_service_tracks_state() {
        let mut audio = silent();
        assert!(!audio.is_active());
        assert!(audio.is_muted());
        assert!(!audio.toggle_mute());
        assert!(audio.toggle_mute());
        audio.play(Sfx::Pop);
        audio.stop_music();
        audio.dispose();
        assert!(!audio.is_active());
    }

    #[test]
    fn stage_track_needs_a_device() {
        let mut audio = silent();
        audio.music_stopped = false;
        assert!(!audio.play_stage_track(Path::new("party.ogg")));
        assert!(audio.track.is_none());

        audio.stop_music();
        assert!(!audio.play_stage_track(Path::new("party.ogg")));
    }
}
