//! Playback controller
//!
//! `PlaybackController` owns the playlist, the shuffle and repeat modes and a
//! media engine. It decides what plays next and reports everything it does
//! as [`PlayerEvent`]s to whoever subscribed.

use std::sync::mpsc;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };

use crate::engine::{ EngineNotification, MediaEngine, PlaybackState };
use crate::playlist::{ Playlist, RepeatMode };


/// Volume applied when nothing else has been requested.
pub const DEFAULT_VOLUME: u8 = 70;


/// Events emitted by the controller for front-end updates.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum PlayerEvent {
    /// The current track changed. `None` means no track is current.
    TrackChanged { track: Option<String> },
    TrackFinished,
    PositionChanged { position_ms: u64 },
    DurationChanged { duration_ms: u64 },
    StateChanged { state: PlaybackState },
}


#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum Direction {
    Forward,
    Backward,
}


/// Playlist-driven playback on top of a [`MediaEngine`].
pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    playlist: Playlist,
    shuffle: bool,
    repeat: RepeatMode,
    volume: u8,
    rng: StdRng,
    subscribers: Vec<mpsc::Sender<PlayerEvent>>,
}


impl<E: MediaEngine> PlaybackController<E> {
    /// Creates a controller with an OS-seeded shuffle generator.
    pub fn new( engine: E ) -> Self {
        Self::with_rng( engine, StdRng::from_os_rng() )
    }


    /// Creates a controller with a fixed shuffle seed.
    pub fn with_seed( engine: E, seed: u64 ) -> Self {
        Self::with_rng( engine, StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( mut engine: E, rng: StdRng ) -> Self {
        engine.set_volume( DEFAULT_VOLUME );
        Self {
            engine,
            playlist: Playlist::new(),
            shuffle: false,
            repeat: RepeatMode::Off,
            volume: DEFAULT_VOLUME,
            rng,
            subscribers: Vec::new(),
        }
    }


    /// Registers a new event subscriber.
    ///
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe( &mut self ) -> mpsc::Receiver<PlayerEvent> {
        let ( tx, rx ) = mpsc::channel();
        self.subscribers.push( tx );
        rx
    }


    // Playlist management

    /// Appends tracks to the playlist.
    ///
    /// If nothing was current, the first track becomes current and is loaded
    /// into the engine without starting playback.
    pub fn load( &mut self, tracks: impl IntoIterator<Item = String> ) {
        let before = self.playlist.len();
        self.playlist.add_many( tracks );
        let added = self.playlist.len() - before;
        if added == 0 {
            return;
        }

        tracing::debug!( "Loaded {} track(s), playlist now {}", added, self.playlist.len() );

        if self.playlist.current_index().is_none() {
            self.playlist.jump_to( 0 );
            self.load_current();
        }
    }


    /// Stops playback and empties the playlist.
    pub fn clear( &mut self ) {
        self.engine.stop();
        self.playlist.clear();
        self.emit( PlayerEvent::TrackChanged { track: None } );
    }


    /// Removes the track at `index`, returning it.
    ///
    /// Removing the current track stops playback and loads its successor
    /// (without playing it). Out-of-range indices return `None`.
    pub fn remove_at( &mut self, index: usize ) -> Option<String> {
        let was_current = self.playlist.current_index() == Some( index );
        let removed = self.playlist.remove( index )?;

        if was_current {
            self.engine.stop();
            if self.playlist.current_index().is_some() {
                self.load_current();
            } else {
                self.emit( PlayerEvent::TrackChanged { track: None } );
            }
        }

        tracing::debug!( "Removed track {}: {}", index, removed );
        Some( removed )
    }


    /// Makes `index` the current track and loads it without playing.
    pub fn select( &mut self, index: usize ) -> bool {
        if self.playlist.jump_to( index ).is_none() {
            return false;
        }
        self.load_current();
        true
    }


    /// Makes `index` the current track and starts playing it.
    pub fn jump_to( &mut self, index: usize ) -> bool {
        if !self.select( index ) {
            return false;
        }
        self.play();
        true
    }


    // Load / play

    fn load_current( &mut self ) {
        if let Some( track ) = self.playlist.current().map( str::to_owned ) {
            tracing::info!( "Loading: {}", track );
            self.engine.set_source( &track );
            self.emit( PlayerEvent::TrackChanged { track: Some( track ) } );
        }
    }


    /// Starts or resumes playback of the current track.
    pub fn play( &mut self ) {
        if self.playlist.is_empty() {
            return;
        }
        if self.playlist.current_index().is_none() {
            self.playlist.jump_to( 0 );
            self.load_current();
        }
        if self.engine.has_media() {
            self.engine.play();
        }
    }


    pub fn pause( &mut self ) {
        self.engine.pause();
    }


    pub fn stop( &mut self ) {
        self.engine.stop();
    }


    /// Pauses when playing, plays otherwise.
    pub fn toggle( &mut self ) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }


    // Navigation

    /// Advances to the next track and plays it.
    pub fn next( &mut self ) {
        self.navigate( Direction::Forward );
    }


    /// Goes back to the previous track and plays it.
    pub fn previous( &mut self ) {
        self.navigate( Direction::Backward );
    }


    fn navigate( &mut self, direction: Direction ) {
        if self.playlist.is_empty() {
            return;
        }

        if self.repeat == RepeatMode::One {
            self.replay_current();
            return;
        }

        let len = self.playlist.len();
        let target = if self.shuffle {
            self.random_other_index( len )
        } else {
            let step = match direction {
                Direction::Forward => 1,
                Direction::Backward => -1,
            };
            ( self.playlist.cursor_value() + step ).rem_euclid( len as i64 ) as usize
        };

        self.playlist.jump_to( target );
        self.load_current();
        self.play();
    }


    /// Draws a uniformly random index different from the cursor.
    fn random_other_index( &mut self, len: usize ) -> usize {
        if len <= 1 {
            return 0;
        }
        let current = self.playlist.current_index();
        loop {
            let candidate = self.rng.random_range( 0..len );
            if Some( candidate ) != current {
                return candidate;
            }
        }
    }


    fn replay_current( &mut self ) {
        self.load_current();
        self.play();
    }


    // Engine notifications

    /// Reacts to a notification delivered by the engine.
    pub fn handle_notification( &mut self, notification: EngineNotification ) {
        match notification {
            EngineNotification::PositionChanged { position_ms } => {
                self.emit( PlayerEvent::PositionChanged { position_ms } );
            }
            EngineNotification::DurationChanged { duration_ms } => {
                self.emit( PlayerEvent::DurationChanged { duration_ms } );
            }
            EngineNotification::StateChanged { state } => {
                self.emit( PlayerEvent::StateChanged { state } );
            }
            EngineNotification::EndOfMedia => self.on_end_of_media(),
        }
    }


    fn on_end_of_media( &mut self ) {
        self.emit( PlayerEvent::TrackFinished );

        match self.repeat {
            RepeatMode::One => self.replay_current(),
            RepeatMode::All => self.next(),
            RepeatMode::Off => {
                if !self.shuffle && self.playlist.at_last() {
                    tracing::info!( "Reached end of playlist" );
                    self.stop();
                    return;
                }
                self.next();
            }
        }
    }


    // Control

    /// Sets the volume, clamped to 0-100. Returns the value applied.
    pub fn set_volume( &mut self, volume: i64 ) -> u8 {
        let volume = volume.clamp( 0, 100 ) as u8;
        self.volume = volume;
        self.engine.set_volume( volume );
        volume
    }


    /// Seeks to a position in milliseconds.
    pub fn seek( &mut self, position_ms: u64 ) {
        self.engine.set_position( position_ms );
    }


    pub fn set_shuffle( &mut self, enabled: bool ) {
        self.shuffle = enabled;
    }


    pub fn set_repeat( &mut self, mode: RepeatMode ) {
        self.repeat = mode;
    }


    /// Sets the repeat mode by name. Unknown names leave the mode unchanged.
    pub fn set_repeat_named( &mut self, name: &str ) {
        if let Some( mode ) = RepeatMode::from_name( name ) {
            self.repeat = mode;
        }
    }


    // Accessors

    pub fn tracks( &self ) -> &[String] {
        self.playlist.tracks()
    }


    pub fn cursor( &self ) -> Option<usize> {
        self.playlist.current_index()
    }


    pub fn current_track( &self ) -> Option<&str> {
        self.playlist.current()
    }


    pub fn shuffle( &self ) -> bool {
        self.shuffle
    }


    pub fn repeat( &self ) -> RepeatMode {
        self.repeat
    }


    pub fn volume( &self ) -> u8 {
        self.volume
    }


    pub fn state( &self ) -> PlaybackState {
        self.engine.state()
    }


    pub fn is_playing( &self ) -> bool {
        self.engine.state() == PlaybackState::Playing
    }


    /// Current position in milliseconds.
    pub fn position( &self ) -> u64 {
        self.engine.position()
    }


    /// Duration of the current source in milliseconds.
    pub fn duration( &self ) -> u64 {
        self.engine.duration()
    }


    pub fn engine( &self ) -> &E {
        &self.engine
    }


    pub fn engine_mut( &mut self ) -> &mut E {
        &mut self.engine
    }


    fn emit( &mut self, event: PlayerEvent ) {
        self.subscribers.retain( |tx| tx.send( event.clone() ).is_ok() );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::engine::VirtualEngine;


    fn controller( names: &[&str] ) -> PlaybackController<VirtualEngine> {
        let mut controller = PlaybackController::with_seed( VirtualEngine::default(), 7 );
        controller.load( names.iter().map( |s| s.to_string() ) );
        controller
    }


    fn changed( track: &str ) -> PlayerEvent {
        PlayerEvent::TrackChanged { track: Some( track.to_string() ) }
    }


    #[test]
    fn test_load_selects_first_without_playing() {
        let mut controller = PlaybackController::with_seed( VirtualEngine::default(), 1 );
        let events = controller.subscribe();

        controller.load( vec![ "a".to_string(), "b".to_string() ] );

        assert_eq!( controller.cursor(), Some( 0 ) );
        assert_eq!( controller.engine().source(), Some( "a" ) );
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert_eq!( events.try_iter().collect::<Vec<_>>(), vec![ changed( "a" ) ] );
    }


    #[test]
    fn test_load_keeps_existing_cursor() {
        let mut controller = controller( &[ "a", "b" ] );
        controller.select( 1 );
        let events = controller.subscribe();

        controller.load( vec![ "c".to_string() ] );

        assert_eq!( controller.cursor(), Some( 1 ) );
        assert!( events.try_iter().next().is_none() );
    }


    #[test]
    fn test_clear_emits_empty_track() {
        let mut controller = controller( &[ "a", "b" ] );
        controller.play();
        let events = controller.subscribe();

        controller.clear();

        assert!( controller.tracks().is_empty() );
        assert_eq!( controller.cursor(), None );
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert_eq!( events.try_iter().collect::<Vec<_>>(), vec![ PlayerEvent::TrackChanged { track: None } ] );
    }


    #[test]
    fn test_remove_current_loads_successor_without_playing() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.jump_to( 1 );
        assert!( controller.is_playing() );
        let events = controller.subscribe();

        assert_eq!( controller.remove_at( 1 ).as_deref(), Some( "b" ) );

        assert_eq!( controller.cursor(), Some( 1 ) );
        assert_eq!( controller.current_track(), Some( "c" ) );
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert!( events.try_iter().any( |e| e == changed( "c" ) ) );
    }


    #[test]
    fn test_remove_current_last_clamps_cursor() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.select( 2 );
        controller.remove_at( 2 );
        assert_eq!( controller.cursor(), Some( 1 ) );
    }


    #[test]
    fn test_remove_last_remaining_track() {
        let mut controller = controller( &[ "a" ] );
        let events = controller.subscribe();

        controller.remove_at( 0 );

        assert_eq!( controller.cursor(), None );
        assert_eq!( events.try_iter().collect::<Vec<_>>(), vec![ PlayerEvent::TrackChanged { track: None } ] );
    }


    #[test]
    fn test_remove_before_cursor_is_silent() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.jump_to( 2 );
        let events = controller.subscribe();

        controller.remove_at( 0 );

        assert_eq!( controller.cursor(), Some( 1 ) );
        assert_eq!( controller.current_track(), Some( "c" ) );
        assert!( controller.is_playing() );
        assert!( !events.try_iter().any( |e| matches!( e, PlayerEvent::TrackChanged { .. } ) ) );
    }


    #[test]
    fn test_remove_out_of_range() {
        let mut controller = controller( &[ "a" ] );
        assert_eq!( controller.remove_at( 5 ), None );
        assert_eq!( controller.tracks().len(), 1 );
    }


    #[test]
    fn test_play_empty_is_noop() {
        let mut controller = PlaybackController::with_seed( VirtualEngine::default(), 1 );
        controller.play();
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert_eq!( controller.cursor(), None );
    }


    #[test]
    fn test_toggle() {
        let mut controller = controller( &[ "a" ] );
        controller.toggle();
        assert_eq!( controller.state(), PlaybackState::Playing );
        controller.toggle();
        assert_eq!( controller.state(), PlaybackState::Paused );
        controller.toggle();
        assert_eq!( controller.state(), PlaybackState::Playing );
    }


    #[test]
    fn test_sequential_navigation_wraps() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.select( 2 );
        controller.next();
        assert_eq!( controller.cursor(), Some( 0 ) );
        assert!( controller.is_playing() );

        controller.previous();
        assert_eq!( controller.cursor(), Some( 2 ) );
        controller.previous();
        assert_eq!( controller.cursor(), Some( 1 ) );
    }


    #[test]
    fn test_repeat_one_replays_current() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.select( 1 );
        controller.set_repeat( RepeatMode::One );
        let events = controller.subscribe();

        controller.next();
        assert_eq!( controller.cursor(), Some( 1 ) );
        controller.previous();
        assert_eq!( controller.cursor(), Some( 1 ) );

        assert!( controller.is_playing() );
        let reloads = events.try_iter().filter( |e| *e == changed( "b" ) ).count();
        assert_eq!( reloads, 2 );
    }


    #[test]
    fn test_shuffle_never_repeats_current() {
        let mut controller = controller( &[ "a", "b", "c", "d" ] );
        controller.set_shuffle( true );
        for _ in 0..50 {
            let before = controller.cursor();
            controller.next();
            assert_ne!( controller.cursor(), before );
            let before = controller.cursor();
            controller.previous();
            assert_ne!( controller.cursor(), before );
        }
    }


    #[test]
    fn test_shuffle_single_track_stays() {
        let mut controller = controller( &[ "only" ] );
        controller.set_shuffle( true );
        controller.next();
        assert_eq!( controller.cursor(), Some( 0 ) );
        assert!( controller.is_playing() );
    }


    #[test]
    fn test_end_of_last_track_stops() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.jump_to( 2 );
        let events = controller.subscribe();

        controller.handle_notification( EngineNotification::EndOfMedia );

        assert_eq!( controller.cursor(), Some( 2 ) );
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert_eq!( events.try_recv(), Ok( PlayerEvent::TrackFinished ) );
    }


    #[test]
    fn test_end_of_last_track_with_repeat_all_wraps() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.set_repeat( RepeatMode::All );
        controller.jump_to( 2 );

        controller.handle_notification( EngineNotification::EndOfMedia );

        assert_eq!( controller.cursor(), Some( 0 ) );
        assert!( controller.is_playing() );
    }


    #[test]
    fn test_end_of_middle_track_advances() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.jump_to( 0 );
        controller.handle_notification( EngineNotification::EndOfMedia );
        assert_eq!( controller.cursor(), Some( 1 ) );
        assert!( controller.is_playing() );
    }


    #[test]
    fn test_end_with_shuffle_keeps_going() {
        let mut controller = controller( &[ "a", "b", "c" ] );
        controller.set_shuffle( true );
        controller.jump_to( 2 );
        controller.handle_notification( EngineNotification::EndOfMedia );
        assert_ne!( controller.cursor(), Some( 2 ) );
        assert!( controller.is_playing() );
    }


    #[test]
    fn test_end_with_repeat_one_replays() {
        let mut controller = controller( &[ "a", "b" ] );
        controller.set_repeat( RepeatMode::One );
        controller.jump_to( 1 );
        controller.handle_notification( EngineNotification::EndOfMedia );
        assert_eq!( controller.cursor(), Some( 1 ) );
        assert!( controller.is_playing() );
    }


    #[test]
    fn test_engine_notifications_are_forwarded() {
        let mut controller = controller( &[ "a" ] );
        let events = controller.subscribe();

        controller.handle_notification( EngineNotification::PositionChanged { position_ms: 1200 } );
        controller.handle_notification( EngineNotification::StateChanged { state: PlaybackState::Paused } );

        assert_eq!( events.try_iter().collect::<Vec<_>>(), vec![
            PlayerEvent::PositionChanged { position_ms: 1200 },
            PlayerEvent::StateChanged { state: PlaybackState::Paused },
        ]);
    }


    #[test]
    fn test_set_volume_clamps() {
        let mut controller = controller( &[] );
        assert_eq!( controller.volume(), DEFAULT_VOLUME );
        assert_eq!( controller.set_volume( 250 ), 100 );
        assert_eq!( controller.engine().volume(), 100 );
        assert_eq!( controller.set_volume( -5 ), 0 );
        assert_eq!( controller.volume(), 0 );
    }


    #[test]
    fn test_set_repeat_named_ignores_unknown() {
        let mut controller = controller( &[] );
        controller.set_repeat_named( "all" );
        controller.set_repeat_named( "bogus" );
        controller.set_repeat_named( "One" );
        controller.set_repeat_named( "off" );
        assert_eq!( controller.repeat(), RepeatMode::All );
    }


    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut controller = controller( &[] );
        let kept = controller.subscribe();
        drop( controller.subscribe() );

        controller.load( vec![ "a".to_string() ] );

        assert_eq!( controller.subscribers.len(), 1 );
        assert_eq!( kept.try_recv(), Ok( changed( "a" ) ) );
    }


    proptest::proptest! {
        #[test]
        fn cursor_stays_in_bounds( ops in proptest::collection::vec( ( 0u8..7, 0usize..6 ), 1..200 ) ) {
            let mut controller = PlaybackController::with_seed( VirtualEngine::default(), 42 );

            for ( op, arg ) in ops {
                match op {
                    0 => controller.load( ( 0..arg ).map( |n| format!( "track_{n}.mp3" ) ) ),
                    1 => { controller.remove_at( arg ); }
                    2 => controller.clear(),
                    3 => controller.next(),
                    4 => controller.previous(),
                    5 => controller.set_shuffle( arg % 2 == 0 ),
                    _ => controller.handle_notification( EngineNotification::EndOfMedia ),
                }

                let len = controller.tracks().len();
                match controller.cursor() {
                    Some( cursor ) => proptest::prop_assert!( cursor < len ),
                    None => proptest::prop_assert!( len == 0 ),
                }
            }
        }


        #[test]
        fn sequential_next_is_successor( len in 1usize..20, start in 0usize..20 ) {
            let mut controller = PlaybackController::with_seed( VirtualEngine::default(), 3 );
            controller.load( ( 0..len ).map( |n| n.to_string() ) );
            let start = start % len;
            controller.select( start );

            controller.next();
            proptest::prop_assert_eq!( controller.cursor(), Some( ( start + 1 ) % len ) );

            controller.select( start );
            controller.previous();
            proptest::prop_assert_eq!( controller.cursor(), Some( ( start + len - 1 ) % len ) );
        }
    }
}
