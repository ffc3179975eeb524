use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

/// Short sine chime with a linear fade-out so it doesn't click.
pub struct Chime {
    sample_rate: u32,
    frequency: f32,
    total_samples: u32,
    position: u32,
}

impl Chime {
    pub fn new(frequency: f32, duration: Duration) -> Self {
        let sample_rate = 44100;
        Self {
            sample_rate,
            frequency,
            total_samples: (duration.as_secs_f32() * sample_rate as f32) as u32,
            position: 0,
        }
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let t = self.position as f32 / self.sample_rate as f32;
        let envelope = 1.0 - self.position as f32 / self.total_samples as f32;
        self.position += 1;

        Some((2.0 * PI * self.frequency * t).sin() * envelope * 0.4)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.position) as usize)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / self.sample_rate as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_is_finite_and_fades_out() {
        let chime = Chime::new(880.0, Duration::from_millis(100));
        let samples: Vec<f32> = chime.collect();
        assert_eq!(samples.len(), 4410);
        assert!(samples.iter().all(|s| s.abs() <= 0.4));
        assert!(samples.last().unwrap().abs() < 0.01);
    }
}
