//! Application state and command execution.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{ anyhow, Result };

use gifly_core::{
    command::{ self, format_time },
    library::{ self, MediaKind },
    session,
    Command, GifCommand, GifDock, GifLibrary, PlaybackController, PlaybackState, PlayerEvent,
    SettingsDocument, SettingsStore, VirtualEngine,
};

use crate::cli::Args;


/// Dock stand-in that reports what the overlay would show.
#[derive( Debug, Default )]
pub struct LogDock {
    defaults: Vec<String>,
    showing: Vec<String>,
}


impl LogDock {
    /// GIFs currently on display.
    pub fn showing( &self ) -> &[String] {
        &self.showing
    }
}


impl GifDock for LogDock {
    fn update_for_track( &mut self, track: &str, gifs: &[String] ) {
        self.showing = if gifs.is_empty() { self.defaults.clone() } else { gifs.to_vec() };
        tracing::info!( "Dock: {} GIF(s) for {:?}", self.showing.len(), display_name( track ) );
    }


    fn update_default_gifs( &mut self, gifs: &[String] ) {
        self.defaults = gifs.to_vec();
        tracing::info!( "Dock: {} default GIF(s)", self.defaults.len() );
    }
}


/// Application state.
pub struct App {
    controller: PlaybackController<VirtualEngine>,
    events: mpsc::Receiver<PlayerEvent>,
    store: SettingsStore,
    settings: SettingsDocument,
    gifs: GifLibrary,
    dock: LogDock,
    should_quit: bool,
}


impl App {
    /// Creates a new App, restoring the last session.
    pub fn new( args: &Args ) -> Result<Self> {
        let path = args.settings.clone()
            .or_else( SettingsStore::default_path )
            .ok_or_else( || anyhow!( "Could not determine the settings directory" ) )?;
        let store = SettingsStore::new( path );
        tracing::info!( "Using settings at {:?}", store.path() );

        let settings = store.load();
        let engine = VirtualEngine::new( Duration::from_secs( args.track_length.max( 1 ) ) );
        let mut controller = PlaybackController::new( engine );
        let events = controller.subscribe();

        session::restore( &mut controller, &settings );

        let gifs = GifLibrary::from_document( &settings );
        let mut dock = LogDock::default();
        dock.update_default_gifs( gifs.defaults() );

        let mut app = Self {
            controller,
            events,
            store,
            settings,
            gifs,
            dock,
            should_quit: false,
        };

        if !args.files.is_empty() {
            let tracks = library::collect( &args.files, MediaKind::Audio )?;
            app.controller.load( tracks );
        }

        let current = app.controller.current_track().map( str::to_owned );
        app.gifs.show_on( &mut app.dock, current.as_deref() );

        if args.play {
            app.controller.play();
        }

        for line in app.pump() {
            tracing::info!( "{}", line );
        }

        Ok( app )
    }


    /// Returns true once the user asked to quit.
    pub fn should_quit( &self ) -> bool {
        self.should_quit
    }


    /// Advances the playback clock and reacts to what happened.
    ///
    /// @returns Lines to show the user
    pub fn tick( &mut self, elapsed: Duration ) -> Vec<String> {
        self.controller.engine_mut().advance( elapsed );
        self.pump()
    }


    /// Parses and runs one line of input.
    ///
    /// @returns Lines to show the user
    pub fn execute( &mut self, input: &str ) -> Vec<String> {
        if input.trim().is_empty() {
            return Vec::new();
        }

        let mut lines = match Command::parse( input ) {
            Ok( cmd ) => {
                let mutates = cmd.mutates();
                let result = self.run_command( cmd );
                if mutates {
                    self.save_state();
                }
                match result {
                    Ok( message ) => message.into_iter().collect(),
                    Err( e ) => vec![ format!( "Error: {}", e ) ],
                }
            }
            Err( e ) => vec![ format!( "{} (try /help)", e ) ],
        };

        lines.extend( self.pump() );
        lines
    }


    fn run_command( &mut self, cmd: Command ) -> Result<Option<String>> {
        let message = match cmd {
            Command::Add { path } => {
                let tracks = library::collect( [ &path ], MediaKind::Audio )?;
                let count = tracks.len();
                self.controller.load( tracks );
                format!( "Added {} song(s)", count )
            }
            Command::Remove { index } => {
                match self.controller.remove_at( index ) {
                    Some( removed ) => {
                        self.gifs.forget_track( &removed );
                        format!( "Removed {}", display_name( &removed ) )
                    }
                    None => format!( "No track {}", index + 1 ),
                }
            }
            Command::Clear => {
                self.controller.clear();
                self.gifs.forget_all_tracks();
                "Playlist cleared".to_string()
            }
            Command::List { filter } => self.playlist_listing( filter.as_deref() ),
            Command::Goto { index } => {
                if self.controller.jump_to( index ) {
                    return Ok( None );
                }
                format!( "No track {}", index + 1 )
            }
            Command::Save { name } => {
                session::save_named( &self.controller, &mut self.settings, &name );
                format!( "Saved playlist '{}'", name )
            }
            Command::Load { name } => {
                if session::load_named( &mut self.controller, &self.settings, &name ) {
                    format!( "Loaded playlist '{}'", name )
                } else {
                    format!( "No playlist named '{}'", name )
                }
            }
            Command::Shuffle { enabled } => {
                let enabled = enabled.unwrap_or( !self.controller.shuffle() );
                self.controller.set_shuffle( enabled );
                format!( "Shuffle {}", if enabled { "ON" } else { "OFF" } )
            }
            Command::Repeat { mode } => {
                let mode = mode.unwrap_or_else( || self.controller.repeat().cycle() );
                self.controller.set_repeat( mode );
                format!( "Repeat: {}", mode )
            }
            Command::Play | Command::Toggle if self.controller.tracks().is_empty() => {
                "Please add songs first!".to_string()
            }
            Command::Play => {
                self.controller.play();
                return Ok( None );
            }
            Command::Toggle => {
                self.controller.toggle();
                return Ok( None );
            }
            Command::Pause => {
                self.controller.pause();
                return Ok( None );
            }
            Command::Stop => {
                self.controller.stop();
                return Ok( None );
            }
            Command::Next => {
                self.controller.next();
                return Ok( None );
            }
            Command::Prev => {
                self.controller.previous();
                return Ok( None );
            }
            Command::Seek { position_ms } => {
                self.controller.seek( position_ms );
                format!( "Seeked to {}", format_time( self.controller.position() as i64 ) )
            }
            Command::Volume { level } => {
                let volume = match level {
                    Some( level ) => self.controller.set_volume( level ),
                    None => self.controller.volume(),
                };
                format!( "Volume: {}", volume )
            }
            Command::Gif( gif ) => self.run_gif_command( gif )?,
            Command::Status => self.status_line(),
            Command::Help => command::help_text().to_string(),
            Command::Quit => {
                self.should_quit = true;
                return Ok( None );
            }
        };
        Ok( Some( message ) )
    }


    fn run_gif_command( &mut self, cmd: GifCommand ) -> Result<String> {
        let current = self.controller.current_track().map( str::to_owned );

        let message = match cmd {
            GifCommand::Add { path } => {
                let found = library::collect( [ &path ], MediaKind::Gif )?;
                let added = self.gifs.add_defaults( found );
                self.dock.update_default_gifs( self.gifs.defaults() );
                format!( "Added {} GIF(s)", added )
            }
            GifCommand::Remove { index } => {
                match self.gifs.remove_default( index ) {
                    Some( removed ) => {
                        self.dock.update_default_gifs( self.gifs.defaults() );
                        format!( "Removed {}", display_name( &removed ) )
                    }
                    None => format!( "No GIF {}", index + 1 ),
                }
            }
            GifCommand::Clear => {
                self.gifs.clear_defaults();
                self.dock.update_default_gifs( self.gifs.defaults() );
                "All GIFs removed".to_string()
            }
            GifCommand::Assign { path } => {
                let track = current.as_deref().ok_or_else( || anyhow!( "No song loaded" ) )?;
                let found = library::collect( [ &path ], MediaKind::Gif )?;
                let assigned = found.into_iter()
                    .filter( |gif| self.gifs.assign( track, gif.clone() ) )
                    .count();
                self.gifs.show_on( &mut self.dock, Some( track ) );
                format!( "Attached {} GIF(s) to {}", assigned, display_name( track ) )
            }
            GifCommand::Unassign => {
                let track = current.as_deref().ok_or_else( || anyhow!( "No song loaded" ) )?;
                self.gifs.unassign( track );
                self.gifs.show_on( &mut self.dock, Some( track ) );
                format!( "Detached GIFs from {}", display_name( track ) )
            }
            GifCommand::List => {
                let gifs = self.gifs.resolve( current.as_deref() );
                if gifs.is_empty() {
                    "No GIFs".to_string()
                } else {
                    numbered( gifs, None )
                }
            }
        };
        Ok( message )
    }


    /// Drains engine notifications and controller events.
    fn pump( &mut self ) -> Vec<String> {
        // Reacting to one notification can queue more (end of track loads the next)
        loop {
            let notifications = self.controller.engine_mut().drain_notifications();
            if notifications.is_empty() {
                break;
            }
            for notification in notifications {
                self.controller.handle_notification( notification );
            }
        }

        let mut lines = Vec::new();
        let mut dirty = false;

        while let Ok( event ) = self.events.try_recv() {
            match event {
                PlayerEvent::TrackChanged { track } => {
                    self.gifs.show_on( &mut self.dock, track.as_deref() );
                    lines.push( match track.as_deref() {
                        Some( track ) => format!( "Now Playing: {}", display_name( track ) ),
                        None => "No song loaded".to_string(),
                    });
                    dirty = true;
                }
                PlayerEvent::TrackFinished => dirty = true,
                PlayerEvent::StateChanged { state } => {
                    tracing::debug!( "Playback state: {:?}", state );
                }
                PlayerEvent::PositionChanged { .. } | PlayerEvent::DurationChanged { .. } => {}
            }
        }

        if dirty {
            self.save_state();
        }
        lines
    }


    /// Captures the session into the settings document and writes it out.
    pub fn save_state( &mut self ) {
        session::capture( &self.controller, &mut self.settings );
        self.gifs.write_to( &mut self.settings );
        self.store.save( &self.settings );
    }


    /// One-line summary of what is playing.
    pub fn status_line( &self ) -> String {
        let icon = match self.controller.state() {
            PlaybackState::Playing => "▶",
            PlaybackState::Paused => "⏸",
            PlaybackState::Stopped => "■",
        };
        let name = self.controller.current_track()
            .map( display_name )
            .unwrap_or_else( || "No song".to_string() );

        format!(
            "{} {}  {} / {}  shuffle {}  repeat {}  vol {}",
            icon,
            name,
            format_time( self.controller.position() as i64 ),
            format_time( self.controller.duration() as i64 ),
            if self.controller.shuffle() { "on" } else { "off" },
            self.controller.repeat(),
            self.controller.volume(),
        )
    }


    /// Numbered playlist, keeping only names that contain `filter`
    /// (case-insensitive). Numbers stay those of the full playlist.
    fn playlist_listing( &self, filter: Option<&str> ) -> String {
        let tracks = self.controller.tracks();
        if tracks.is_empty() {
            return "Playlist is empty".to_string();
        }

        let Some( term ) = filter.map( str::to_lowercase ) else {
            return numbered( tracks, self.controller.cursor() );
        };
        let listing = numbered_where( tracks, self.controller.cursor(), |item| {
            display_name( item ).to_lowercase().contains( &term )
        });
        if listing.is_empty() {
            format!( "No songs match '{}'", term )
        } else {
            listing
        }
    }
}


fn numbered( items: &[String], marked: Option<usize> ) -> String {
    numbered_where( items, marked, |_| true )
}


fn numbered_where( items: &[String], marked: Option<usize>, keep: impl Fn( &str ) -> bool ) -> String {
    items.iter()
        .enumerate()
        .filter( |( _, item )| keep( item.as_str() ) )
        .map( |( i, item )| {
            let marker = if Some( i ) == marked { '>' } else { ' ' };
            format!( "{} {:>3}. {}", marker, i + 1, display_name( item ) )
        })
        .collect::<Vec<_>>()
        .join( "\n" )
}


/// File name of a track or GIF identifier, for display.
fn display_name( id: &str ) -> String {
    Path::new( id )
        .file_name()
        .map( |n| n.to_string_lossy().into_owned() )
        .unwrap_or_else( || id.to_string() )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{ tempdir, TempDir };

    use gifly_core::RepeatMode;


    struct Fixture {
        dir: TempDir,
        app: App,
    }


    impl Fixture {
        fn settings_path( &self ) -> std::path::PathBuf {
            self.dir.path().join( "settings.json" )
        }
    }


    fn fixture( songs: &[&str] ) -> Fixture {
        let dir = tempdir().expect( "tempdir" );
        let music = dir.path().join( "music" );
        fs::create_dir( &music ).expect( "mkdir" );
        for song in songs {
            fs::write( music.join( song ), b"" ).expect( "write" );
        }

        let args = Args {
            settings: Some( dir.path().join( "settings.json" ) ),
            track_length: 2,
            play: false,
            verbose: 0,
            files: if songs.is_empty() { Vec::new() } else { vec![ music ] },
        };
        let app = App::new( &args ).expect( "app" );
        Fixture { dir, app }
    }


    #[test]
    fn test_startup_adds_files_and_selects_first() {
        let fx = fixture( &[ "a.mp3", "b.mp3" ] );
        assert_eq!( fx.app.controller.tracks().len(), 2 );
        assert_eq!( fx.app.controller.cursor(), Some( 0 ) );
        assert_eq!( fx.app.controller.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_commands_persist_settings() {
        let mut fx = fixture( &[ "a.mp3", "b.mp3" ] );

        fx.app.execute( "/vol 250" );
        fx.app.execute( "/repeat" );
        fx.app.execute( "/goto 2" );

        let doc = SettingsStore::new( fx.settings_path() ).load();
        assert_eq!( doc.volume, 100 );
        assert_eq!( doc.repeat_mode, RepeatMode::All );
        assert_eq!( doc.last_index, 1 );
        assert_eq!( doc.playlist.len(), 2 );
    }


    #[test]
    fn test_playback_runs_to_end_of_playlist() {
        let mut fx = fixture( &[ "a.mp3", "b.mp3" ] );
        fx.app.execute( "play" );

        let mut lines = Vec::new();
        for _ in 0..10 {
            lines.extend( fx.app.tick( Duration::from_secs( 1 ) ) );
        }

        assert!( lines.iter().any( |l| l == "Now Playing: b.mp3" ) );
        assert_eq!( fx.app.controller.cursor(), Some( 1 ) );
        assert_eq!( fx.app.controller.state(), PlaybackState::Stopped );
    }


    #[test]
    fn test_remove_forgets_gif_associations() {
        let mut fx = fixture( &[ "a.mp3", "b.mp3" ] );
        let gif = fx.dir.path().join( "cat.gif" );
        fs::write( &gif, b"" ).expect( "write" );

        let reply = fx.app.execute( &format!( "gif assign {}", gif.display() ) );
        assert_eq!( reply, vec![ "Attached 1 GIF(s) to a.mp3".to_string() ] );
        assert_eq!( fx.app.dock.showing(), [ gif.to_string_lossy().into_owned() ] );

        fx.app.execute( "rm 1" );

        let doc = SettingsStore::new( fx.settings_path() ).load();
        assert!( doc.song_gifs.is_empty() );
        assert_eq!( fx.app.controller.current_track().map( display_name ).as_deref(), Some( "b.mp3" ) );
    }


    #[test]
    fn test_gif_defaults_feed_the_dock() {
        let mut fx = fixture( &[ "a.mp3" ] );
        let gifs = fx.dir.path().join( "gifs" );
        fs::create_dir( &gifs ).expect( "mkdir" );
        fs::write( gifs.join( "one.gif" ), b"" ).expect( "write" );
        fs::write( gifs.join( "two.gif" ), b"" ).expect( "write" );

        fx.app.execute( &format!( "gif add {}", gifs.display() ) );
        fx.app.execute( "next" );

        assert_eq!( fx.app.dock.showing().len(), 2 );
        let doc = SettingsStore::new( fx.settings_path() ).load();
        assert_eq!( doc.gifs.len(), 2 );
    }


    #[test]
    fn test_list_filters_by_name() {
        let mut fx = fixture( &[ "Daft Punk - One More Time.mp3", "Queen - Bohemian.mp3", "daft punk - Digital Love.mp3" ] );

        let reply = fx.app.execute( "list DAFT" );
        assert_eq!( reply.len(), 1 );
        let lines: Vec<_> = reply[ 0 ].lines().collect();
        assert_eq!( lines.len(), 2 );
        assert!( lines[ 0 ].starts_with( ">   1." ) );
        assert!( lines[ 1 ].contains( "3. daft punk - Digital Love.mp3" ) );

        assert_eq!( fx.app.execute( "find abba" ), vec![ "No songs match 'abba'".to_string() ] );
        assert_eq!( fx.app.execute( "list" )[ 0 ].lines().count(), 3 );
    }


    #[test]
    fn test_end_of_track_settles_in_one_tick() {
        let mut fx = fixture( &[ "a.mp3", "b.mp3" ] );
        fx.app.execute( "play" );

        let lines = fx.app.tick( Duration::from_secs( 3 ) );

        assert_eq!( lines, vec![ "Now Playing: b.mp3".to_string() ] );
        assert_eq!( fx.app.controller.state(), PlaybackState::Playing );
        assert!( fx.app.controller.engine_mut().drain_notifications().is_empty() );
    }


    #[test]
    fn test_play_on_empty_playlist_asks_for_songs() {
        let mut fx = fixture( &[] );
        assert_eq!( fx.app.execute( "toggle" ), vec![ "Please add songs first!".to_string() ] );
    }


    #[test]
    fn test_unknown_command_reports_help() {
        let mut fx = fixture( &[] );
        let reply = fx.app.execute( "dance" );
        assert_eq!( reply.len(), 1 );
        assert!( reply[ 0 ].contains( "/help" ) );
    }


    #[test]
    fn test_quit() {
        let mut fx = fixture( &[] );
        fx.app.execute( "q" );
        assert!( fx.app.should_quit() );
    }


    #[test]
    fn test_session_is_restored_on_next_start() {
        let mut fx = fixture( &[ "a.mp3", "b.mp3", "c.mp3" ] );
        fx.app.execute( "goto 3" );
        fx.app.execute( "shuffle on" );
        fx.app.execute( "quit" );
        fx.app.save_state();

        let args = Args {
            settings: Some( fx.settings_path() ),
            track_length: 2,
            play: false,
            verbose: 0,
            files: Vec::new(),
        };
        let app = App::new( &args ).expect( "app" );
        assert_eq!( app.controller.tracks().len(), 3 );
        assert_eq!( app.controller.cursor(), Some( 2 ) );
        assert!( app.controller.shuffle() );
        assert_eq!( app.controller.state(), PlaybackState::Stopped );
    }
}
