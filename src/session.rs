use crate::error::{ParseAnomaly, SessionError};
use crate::parser::Parser;
use crate::resolver::active_text;
use crate::srt::SubtitleTrack;

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Where the playback position comes from.
pub trait TimeSource: Send + 'static {
    /// Current position in seconds, `None` while the video is not available.
    fn current_time(&self) -> Option<f64>;

    /// User adjustment in seconds, added to every reading.
    fn offset(&self) -> f64 {
        0.0
    }
}

/// Receives the markup to show. An empty string hides the overlay.
pub trait RenderSink: Send + 'static {
    fn render(&mut self, markup: &str);
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval: Duration,
}

impl SessionConfig {
    /// The configured interval, never shorter than [`MIN_TICK_INTERVAL`].
    pub fn effective_tick_interval(&self) -> Duration {
        self.tick_interval.max(MIN_TICK_INTERVAL)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Resolves the text for one tick, or `None` if the tick should be skipped.
pub fn resolve_tick<T: TimeSource + ?Sized>(track: &SubtitleTrack, source: &T) -> Option<String> {
    let time = source.current_time()?;
    Some(active_text(track, time + source.offset()))
}

/// The loaded track of one playback and the loop that keeps its overlay
/// up to date.
pub struct Session {
    config: SessionConfig,
    parser: Parser,
    track: Option<Arc<SubtitleTrack>>,
    ticker: Option<Ticker>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            parser: Parser::new(),
            track: None,
            ticker: None,
        }
    }

    /// Parses `srt` and starts showing it, replacing whatever was loaded.
    ///
    /// Returns the number of cues in the new track.
    pub fn load<T, R>(&mut self, srt: &str, source: T, sink: R) -> Result<usize, SessionError>
    where
        T: TimeSource,
        R: RenderSink,
    {
        let track = Arc::new(self.parser.parse(srt));
        let cues = track.len();
        if track.is_empty() {
            warn!("Loaded subtitles contain no cues");
        }

        // The old loop must be gone before the new one can tick.
        self.clear();

        let ticker = Ticker::spawn(
            self.config.effective_tick_interval(),
            Arc::clone(&track),
            source,
            sink,
        )?;
        self.track = Some(track);
        self.ticker = Some(ticker);
        debug!("Loaded {} cues", cues);
        Ok(cues)
    }

    /// Stops the overlay. Calling this when nothing is loaded does nothing.
    pub fn clear(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
            debug!("Subtitle ticker stopped");
        }
        self.track = None;
    }

    pub fn track(&self) -> Option<&SubtitleTrack> {
        self.track.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Problems found while parsing the most recently loaded file.
    pub fn anomalies(&self) -> &[ParseAnomaly] {
        self.parser.anomalies()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A thread resolving the track once per interval until cancelled.
struct Ticker {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    fn spawn<T, R>(
        interval: Duration,
        track: Arc<SubtitleTrack>,
        source: T,
        mut sink: R,
    ) -> Result<Self, SessionError>
    where
        T: TimeSource,
        R: RenderSink,
    {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("subtitle-ticker".to_string())
            .spawn(move || {
                // Any message or a dropped sender ends the loop.
                while let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(interval) {
                    match resolve_tick(&track, &source) {
                        Some(markup) => sink.render(&markup),
                        None => trace!("Playback time unavailable, skipping tick"),
                    }
                }
                sink.render("");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Subtitle ticker panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
