use rodio::{OutputStream, Sink, Source};
use std::f32::consts::PI;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const TONE_SECS: f32 = 0.35;
const GAP_SECS: f32 = 0.1;
const REPEATS: u32 = 3;

/// Synthesized two-tone alert chime: a rising pair of sine notes, repeated a
/// few times. Finite, unlike the ambient generators this is modeled on.
pub struct AlertChime {
    num_sample: usize,
    total_samples: usize,
}

impl AlertChime {
    pub fn new() -> Self {
        let cycle = TONE_SECS * 2.0 + GAP_SECS;
        let total_samples = (cycle * REPEATS as f32 * SAMPLE_RATE as f32) as usize;
        Self {
            num_sample: 0,
            total_samples,
        }
    }
}

impl Default for AlertChime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for AlertChime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        self.num_sample += 1;

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let cycle = TONE_SECS * 2.0 + GAP_SECS;
        let phase = t % cycle;

        let freq = if phase < TONE_SECS {
            880.0
        } else if phase < TONE_SECS * 2.0 {
            1174.66 // D6, a fifth up
        } else {
            return Some(0.0); // gap between repeats
        };

        // Short fade at tone edges to avoid clicks
        let tone_phase = phase % TONE_SECS;
        let envelope = (tone_phase / 0.02).min(1.0) * ((TONE_SECS - tone_phase) / 0.02).min(1.0);

        Some((2.0 * PI * freq * t).sin() * 0.2 * envelope)
    }
}

impl Source for AlertChime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples.saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

/// Play the alert chime, best effort. Audio output objects are not Send, so
/// playback runs to completion on its own thread; any failure is logged and
/// swallowed — a missing audio device must never stop the monitor.
pub fn play_alert() {
    let spawn_result = thread::Builder::new()
        .name("alert-chime".to_string())
        .spawn(|| {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(err) => {
                    log::warn!("No audio output available: {err}");
                    return;
                }
            };

            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(err) => {
                    log::warn!("Failed to create audio sink: {err}");
                    return;
                }
            };

            sink.append(AlertChime::new());
            sink.sleep_until_end();
        });

    if let Err(err) = spawn_result {
        log::warn!("Failed to spawn alert chime thread: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_is_finite_and_bounded() {
        let chime = AlertChime::new();
        let expected = chime.total_samples;
        let mut count = 0usize;
        for sample in AlertChime::new() {
            assert!(sample.abs() <= 1.0);
            count += 1;
        }
        assert_eq!(count, expected);
    }
}
