//! Audible alert for milestones and Pomodoro phase changes.
//!
//! Output devices are not `Send`, so playback lives on a dedicated thread
//! that owns the stream and takes commands over a channel. Without the
//! `audio` feature, or when no device can be opened, the chime degrades to a
//! terminal bell.

#[cfg(feature = "audio")]
pub mod tone;

use std::io::Write;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use anyhow::{anyhow, Result};

enum AudioCommand {
    Chime,
}

#[derive(Clone)]
pub struct ChimePlayer {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    enabled: bool,
    volume: f32,
}

impl ChimePlayer {
    pub fn new(enabled: bool, volume: f32) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            enabled,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self.tx.lock().map_err(|e| anyhow!(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let initial_volume = self.volume;

        thread::Builder::new()
            .name("chime".to_string())
            .spawn(move || playback_thread(rx, initial_volume))
            .map_err(|e| anyhow!("failed to spawn chime thread: {e}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    pub fn chime(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Chime)
            .map_err(|e| anyhow!("chime thread gone: {e}"))
    }
}

fn terminal_bell() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}

#[cfg(feature = "audio")]
fn playback_thread(rx: mpsc::Receiver<AudioCommand>, volume: f32) {
    use log::warn;
    use rodio::{OutputStream, Sink};
    use std::time::Duration;

    // Opened lazily; `None` after a failure means fall back to the bell.
    let mut output: Option<Option<(OutputStream, Sink)>> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::Chime => {
                let slot = output.get_or_insert_with(|| {
                    let opened = OutputStream::try_default()
                        .map_err(|e| e.to_string())
                        .and_then(|(stream, handle)| {
                            Sink::try_new(&handle)
                                .map(|sink| (stream, sink))
                                .map_err(|e| e.to_string())
                        });
                    match opened {
                        Ok(pair) => Some(pair),
                        Err(err) => {
                            warn!("No audio output, using terminal bell: {err}");
                            None
                        }
                    }
                });

                match slot {
                    Some((_, sink)) => {
                        sink.set_volume(volume);
                        sink.append(tone::Chime::new(880.0, Duration::from_millis(250)));
                        sink.append(tone::Chime::new(1320.0, Duration::from_millis(350)));
                    }
                    None => terminal_bell(),
                }
            }
        }
    }
}

#[cfg(not(feature = "audio"))]
fn playback_thread(rx: mpsc::Receiver<AudioCommand>, _volume: f32) {
    while let Ok(AudioCommand::Chime) = rx.recv() {
        terminal_bell();
    }
}
