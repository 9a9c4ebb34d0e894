//! Media engine seam
//!
//! The controller never decodes audio itself. It drives a [`MediaEngine`]
//! and reacts to the [`EngineNotification`]s the engine reports back.
//! [`VirtualEngine`] is a clock-only implementation used by the terminal
//! front-end and the tests.

use std::collections::VecDeque;
use std::time::Duration;


/// Current playback state.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}


/// Asynchronous notifications emitted by a media engine.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum EngineNotification {
    PositionChanged { position_ms: u64 },
    DurationChanged { duration_ms: u64 },
    StateChanged { state: PlaybackState },
    EndOfMedia,
}


/// A single-source media player.
pub trait MediaEngine {
    /// Replaces the current source. Playback stops and the position resets.
    fn set_source( &mut self, source: &str );

    /// Returns true if a source is loaded.
    fn has_media( &self ) -> bool;

    fn play( &mut self );
    fn pause( &mut self );
    fn stop( &mut self );

    /// Seeks to a position in milliseconds.
    fn set_position( &mut self, position_ms: u64 );

    fn position( &self ) -> u64;
    fn duration( &self ) -> u64;

    /// Sets the output volume (0-100).
    fn set_volume( &mut self, volume: u8 );

    fn state( &self ) -> PlaybackState;
}


/// Engine that simulates playback time without producing audio.
///
/// Every loaded source is treated as `track_length` long. Position only
/// moves when [`VirtualEngine::advance`] is called while playing.
#[derive( Debug )]
pub struct VirtualEngine {
    source: Option<String>,
    state: PlaybackState,
    position: Duration,
    track_length: Duration,
    volume: u8,
    pending: VecDeque<EngineNotification>,
}


impl VirtualEngine {
    /// Creates an engine whose sources all last `track_length`.
    pub fn new( track_length: Duration ) -> Self {
        Self {
            source: None,
            state: PlaybackState::Stopped,
            position: Duration::ZERO,
            track_length,
            volume: 100,
            pending: VecDeque::new(),
        }
    }


    /// Moves the clock forward by `elapsed`.
    ///
    /// Reaching the end of the source stops the engine and queues
    /// `EndOfMedia`.
    pub fn advance( &mut self, elapsed: Duration ) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.position = ( self.position + elapsed ).min( self.track_length );
        self.pending.push_back( EngineNotification::PositionChanged {
            position_ms: self.position(),
        });

        if self.position >= self.track_length {
            tracing::debug!( "Virtual engine reached end of {:?}", self.source );
            self.set_state( PlaybackState::Stopped );
            self.pending.push_back( EngineNotification::EndOfMedia );
        }
    }


    /// Takes all queued notifications, oldest first.
    pub fn drain_notifications( &mut self ) -> Vec<EngineNotification> {
        self.pending.drain( .. ).collect()
    }


    /// Gets the loaded source, if any.
    pub fn source( &self ) -> Option<&str> {
        self.source.as_deref()
    }


    /// Gets the last volume applied.
    pub fn volume( &self ) -> u8 {
        self.volume
    }


    fn set_state( &mut self, state: PlaybackState ) {
        if self.state != state {
            self.state = state;
            self.pending.push_back( EngineNotification::StateChanged { state } );
        }
    }
}


impl Default for VirtualEngine {
    fn default() -> Self {
        Self::new( Duration::from_secs( 180 ) )
    }
}


impl MediaEngine for VirtualEngine {
    fn set_source( &mut self, source: &str ) {
        self.set_state( PlaybackState::Stopped );
        self.position = Duration::ZERO;

        if source.is_empty() {
            self.source = None;
            return;
        }

        self.source = Some( source.to_string() );
        self.pending.push_back( EngineNotification::DurationChanged {
            duration_ms: self.duration(),
        });
    }


    fn has_media( &self ) -> bool {
        self.source.is_some()
    }


    fn play( &mut self ) {
        if self.source.is_none() {
            return;
        }
        if self.position >= self.track_length {
            self.position = Duration::ZERO;
        }
        self.set_state( PlaybackState::Playing );
    }


    fn pause( &mut self ) {
        if self.state == PlaybackState::Playing {
            self.set_state( PlaybackState::Paused );
        }
    }


    fn stop( &mut self ) {
        self.position = Duration::ZERO;
        self.set_state( PlaybackState::Stopped );
    }


    fn set_position( &mut self, position_ms: u64 ) {
        if self.source.is_none() {
            return;
        }
        self.position = Duration::from_millis( position_ms ).min( self.track_length );
        self.pending.push_back( EngineNotification::PositionChanged {
            position_ms: self.position(),
        });
    }


    fn position( &self ) -> u64 {
        self.position.as_millis() as u64
    }


    fn duration( &self ) -> u64 {
        if self.source.is_some() {
            self.track_length.as_millis() as u64
        } else {
            0
        }
    }


    fn set_volume( &mut self, volume: u8 ) {
        self.volume = volume;
    }


    fn state( &self ) -> PlaybackState {
        self.state
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_play_without_source_is_ignored() {
        let mut engine = VirtualEngine::default();
        engine.play();
        assert_eq!( engine.state(), PlaybackState::Stopped );
        assert!( engine.drain_notifications().is_empty() );
    }


    #[test]
    fn test_set_source_reports_duration() {
        let mut engine = VirtualEngine::new( Duration::from_secs( 2 ) );
        engine.set_source( "a.mp3" );
        assert_eq!(
            engine.drain_notifications(),
            vec![ EngineNotification::DurationChanged { duration_ms: 2000 } ]
        );
    }


    #[test]
    fn test_advance_to_end_emits_end_of_media() {
        let mut engine = VirtualEngine::new( Duration::from_secs( 1 ) );
        engine.set_source( "a.mp3" );
        engine.play();
        engine.drain_notifications();

        engine.advance( Duration::from_millis( 600 ) );
        engine.advance( Duration::from_millis( 600 ) );

        let notes = engine.drain_notifications();
        assert_eq!( notes.last(), Some( &EngineNotification::EndOfMedia ) );
        assert!( notes.contains( &EngineNotification::StateChanged { state: PlaybackState::Stopped } ) );
        assert_eq!( engine.position(), 1000 );
    }


    #[test]
    fn test_paused_clock_does_not_move() {
        let mut engine = VirtualEngine::new( Duration::from_secs( 10 ) );
        engine.set_source( "a.mp3" );
        engine.play();
        engine.advance( Duration::from_secs( 1 ) );
        engine.pause();
        engine.advance( Duration::from_secs( 5 ) );
        assert_eq!( engine.position(), 1000 );
        assert_eq!( engine.state(), PlaybackState::Paused );
    }


    #[test]
    fn test_seek_is_clamped_to_length() {
        let mut engine = VirtualEngine::new( Duration::from_secs( 3 ) );
        engine.set_source( "a.mp3" );
        engine.set_position( 99_000 );
        assert_eq!( engine.position(), 3000 );
    }
}
