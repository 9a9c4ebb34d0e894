//! Playlist and cursor management
//!
//! Holds the ordered track list and the index of the current track. The
//! cursor is kept valid across every mutation: it is either `None` or an
//! index strictly below the playlist length.

use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };
use thiserror::Error;


/// Repeat mode for the playlist.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum RepeatMode {
    #[default]
    #[serde( rename = "none" )]
    Off,
    One,
    All,
}


impl RepeatMode {
    /// Name used in the settings file.
    pub fn as_str( &self ) -> &'static str {
        match self {
            RepeatMode::Off => "none",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }


    /// Exact settings name (`none`, `one` or `all`). Anything else is `None`.
    pub fn from_name( name: &str ) -> Option<Self> {
        match name {
            "none" => Some( RepeatMode::Off ),
            "one" => Some( RepeatMode::One ),
            "all" => Some( RepeatMode::All ),
            _ => None,
        }
    }


    /// Next mode in the toggle cycle: none → all → one → none.
    pub fn cycle( self ) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}


impl fmt::Display for RepeatMode {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( self.as_str() )
    }
}


/// Error returned when a repeat mode name is not recognised.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
#[error( "Unknown repeat mode '{0}', use 'none', 'one' or 'all'" )]
pub struct UnknownRepeatMode( pub String );


impl FromStr for RepeatMode {
    type Err = UnknownRepeatMode;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok( RepeatMode::Off ),
            "one" => Ok( RepeatMode::One ),
            "all" => Ok( RepeatMode::All ),
            _ => Err( UnknownRepeatMode( s.to_string() ) ),
        }
    }
}


/// Ordered track list with a cursor.
#[derive( Debug, Default, Clone )]
pub struct Playlist {
    tracks: Vec<String>,
    current_index: Option<usize>,
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::default()
    }


    /// Appends tracks to the end of the playlist.
    ///
    /// The cursor is left untouched.
    pub fn add_many( &mut self, tracks: impl IntoIterator<Item = String> ) {
        self.tracks.extend( tracks );
    }


    /// Clears the playlist and the cursor.
    pub fn clear( &mut self ) {
        self.tracks.clear();
        self.current_index = None;
    }


    /// Removes the track at `index`, keeping the cursor valid.
    ///
    /// Removing the current track moves the cursor to `min(index, len - 1)`,
    /// or to `None` when nothing is left. Removing a track before the cursor
    /// shifts it down so the same track stays current.
    pub fn remove( &mut self, index: usize ) -> Option<String> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove( index );

        if let Some( current ) = self.current_index {
            if index == current {
                self.current_index = if self.tracks.is_empty() {
                    None
                } else {
                    Some( index.min( self.tracks.len() - 1 ) )
                };
            } else if index < current {
                self.current_index = Some( current - 1 );
            }
        }

        Some( removed )
    }


    /// Gets the current track.
    pub fn current( &self ) -> Option<&str> {
        self.current_index
            .and_then( |i| self.tracks.get( i ) )
            .map( String::as_str )
    }


    /// Moves the cursor to `index`. Out-of-range indices are rejected.
    pub fn jump_to( &mut self, index: usize ) -> Option<&str> {
        if index < self.tracks.len() {
            self.current_index = Some( index );
            self.current()
        } else {
            None
        }
    }


    /// Gets all tracks in the playlist.
    pub fn tracks( &self ) -> &[String] {
        &self.tracks
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the playlist is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Gets the current track index.
    pub fn current_index( &self ) -> Option<usize> {
        self.current_index
    }


    /// Cursor in its persisted form, `-1` when there is no current track.
    pub fn cursor_value( &self ) -> i64 {
        self.current_index.map_or( -1, |i| i as i64 )
    }


    /// Returns true when the cursor sits on the last track.
    ///
    /// An empty playlist with no cursor also counts as "at the end".
    pub fn at_last( &self ) -> bool {
        self.cursor_value() == self.tracks.len() as i64 - 1
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn playlist( names: &[&str] ) -> Playlist {
        let mut playlist = Playlist::new();
        playlist.add_many( names.iter().map( |s| s.to_string() ) );
        playlist
    }


    #[test]
    fn test_add_keeps_cursor() {
        let mut list = playlist( &[ "a", "b" ] );
        assert_eq!( list.current_index(), None );
        list.jump_to( 1 );
        list.add_many( vec![ "c".to_string() ] );
        assert_eq!( list.current(), Some( "b" ) );
    }


    #[test]
    fn test_remove_before_cursor_shifts_down() {
        let mut list = playlist( &[ "a", "b", "c" ] );
        list.jump_to( 2 );
        assert_eq!( list.remove( 0 ).as_deref(), Some( "a" ) );
        assert_eq!( list.current_index(), Some( 1 ) );
        assert_eq!( list.current(), Some( "c" ) );
    }


    #[test]
    fn test_remove_current_last_clamps() {
        let mut list = playlist( &[ "a", "b", "c" ] );
        list.jump_to( 2 );
        list.remove( 2 );
        assert_eq!( list.current_index(), Some( 1 ) );
    }


    #[test]
    fn test_remove_only_track_clears_cursor() {
        let mut list = playlist( &[ "a" ] );
        list.jump_to( 0 );
        list.remove( 0 );
        assert_eq!( list.current_index(), None );
        assert!( list.is_empty() );
    }


    #[test]
    fn test_remove_out_of_range() {
        let mut list = playlist( &[ "a" ] );
        assert_eq!( list.remove( 3 ), None );
        assert_eq!( list.len(), 1 );
    }


    #[test]
    fn test_at_last() {
        let mut list = playlist( &[] );
        assert!( list.at_last() );
        list.add_many( vec![ "a".to_string(), "b".to_string() ] );
        list.jump_to( 0 );
        assert!( !list.at_last() );
        list.jump_to( 1 );
        assert!( list.at_last() );
    }


    #[test]
    fn test_repeat_mode_parse() {
        assert_eq!( "none".parse::<RepeatMode>(), Ok( RepeatMode::Off ) );
        assert_eq!( "OFF".parse::<RepeatMode>(), Ok( RepeatMode::Off ) );
        assert_eq!( "all".parse::<RepeatMode>(), Ok( RepeatMode::All ) );
        assert!( "bogus".parse::<RepeatMode>().is_err() );
    }


    #[test]
    fn test_repeat_mode_from_name_is_exact() {
        assert_eq!( RepeatMode::from_name( "one" ), Some( RepeatMode::One ) );
        assert_eq!( RepeatMode::from_name( "none" ), Some( RepeatMode::Off ) );
        assert_eq!( RepeatMode::from_name( "ALL" ), None );
        assert_eq!( RepeatMode::from_name( "off" ), None );
        assert_eq!( RepeatMode::from_name( " all" ), None );
    }


    #[test]
    fn test_repeat_mode_cycle() {
        assert_eq!( RepeatMode::Off.cycle(), RepeatMode::All );
        assert_eq!( RepeatMode::All.cycle(), RepeatMode::One );
        assert_eq!( RepeatMode::One.cycle(), RepeatMode::Off );
    }


    #[test]
    fn test_repeat_mode_serializes_as_settings_name() {
        let json = serde_json::to_string( &RepeatMode::Off ).unwrap();
        assert_eq!( json, "\"none\"" );
        let mode: RepeatMode = serde_json::from_str( "\"one\"" ).unwrap();
        assert_eq!( mode, RepeatMode::One );
    }
}
