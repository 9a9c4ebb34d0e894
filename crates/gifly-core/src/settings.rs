//! Application settings management
//!
//! The settings document is a flat JSON object. Loading never fails: a
//! missing or corrupt file yields the defaults, and every recognised key is
//! repaired on its own so one bad value cannot take the others down with it.
//! Unknown keys are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{ Path, PathBuf };

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{ Map, Value };
use thiserror::Error;

use crate::controller::DEFAULT_VOLUME;
use crate::playlist::RepeatMode;


/// Directory name under the platform config dir.
pub const APP_DIR: &str = "Gifly";

/// Settings file name.
pub const SETTINGS_FILE: &str = "settings.json";

/// Keys owned by [`SettingsDocument`]; everything else lands in `extra`.
const KNOWN_KEYS: &[&str] = &[
    "playlist",
    "last_index",
    "last_position",
    "volume",
    "gifs",
    "song_gifs",
    "shuffle",
    "repeat_mode",
    "dock_geometry",
    "window_geometry",
    "playlists",
    "theme",
];


/// Window or dock placement: `[x, y, width, height]`.
pub type Geometry = [i32; 4];


/// Errors that can occur while persisting settings.
#[derive( Debug, Error )]
pub enum SettingsError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "JSON error: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "Atomic rename failed: {0}" )]
    Persist( #[from] tempfile::PersistError ),
}


/// The persisted settings document.
#[derive( Debug, Clone, PartialEq, Serialize )]
pub struct SettingsDocument {
    pub playlist: Vec<String>,
    /// Index of the current track, `-1` for none
    pub last_index: i64,
    /// Playback position in milliseconds
    pub last_position: u64,
    pub volume: u8,
    /// Default GIFs shown when a track has none of its own
    pub gifs: Vec<String>,
    /// Per-track GIF lists, keyed by track identifier
    pub song_gifs: BTreeMap<String, Vec<String>>,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub dock_geometry: Option<Geometry>,
    pub window_geometry: Option<Geometry>,
    /// Named playlists
    pub playlists: BTreeMap<String, Vec<String>>,
    pub theme: String,

    /// Keys this version does not know about
    #[serde( flatten )]
    pub extra: Map<String, Value>,
}


impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            playlist: Vec::new(),
            last_index: -1,
            last_position: 0,
            volume: DEFAULT_VOLUME,
            gifs: Vec::new(),
            song_gifs: BTreeMap::new(),
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            dock_geometry: None,
            window_geometry: None,
            playlists: BTreeMap::new(),
            theme: "dark".to_string(),
            extra: Map::new(),
        }
    }
}


impl SettingsDocument {
    /// Builds a document from arbitrary JSON, repairing each field.
    ///
    /// Anything that is not a JSON object yields the defaults.
    pub fn from_value( value: Value ) -> Self {
        let mut map = match value {
            Value::Object( map ) => map,
            other => {
                tracing::warn!( "Settings document is not an object ({}), using defaults", type_name( &other ) );
                return Self::default();
            }
        };

        let defaults = Self::default();
        let mut take = |key: &str| map.remove( key ).unwrap_or( Value::Null );

        let doc = Self {
            playlist: string_list( take( "playlist" ) ).unwrap_or( defaults.playlist ),
            last_index: take( "last_index" ).as_i64().unwrap_or( defaults.last_index ),
            last_position: position( &take( "last_position" ) ).unwrap_or( defaults.last_position ),
            volume: number( &take( "volume" ) )
                .map( clamp_volume )
                .unwrap_or( defaults.volume ),
            gifs: string_list( take( "gifs" ) ).unwrap_or( defaults.gifs ),
            song_gifs: string_list_map( take( "song_gifs" ) ).unwrap_or( defaults.song_gifs ),
            shuffle: take( "shuffle" ).as_bool().unwrap_or( defaults.shuffle ),
            repeat_mode: take( "repeat_mode" )
                .as_str()
                .and_then( RepeatMode::from_name )
                .unwrap_or( defaults.repeat_mode ),
            dock_geometry: geometry( &take( "dock_geometry" ) ),
            window_geometry: geometry( &take( "window_geometry" ) ),
            playlists: string_list_map( take( "playlists" ) ).unwrap_or( defaults.playlists ),
            theme: match take( "theme" ) {
                Value::String( theme ) => theme,
                _ => defaults.theme,
            },
            extra: Map::new(),
        };

        Self { extra: map, ..doc }.validated()
    }


    /// Returns the document with every field brought back into range.
    ///
    /// Idempotent: validating twice gives the same document.
    pub fn validated( mut self ) -> Self {
        self.volume = self.volume.min( 100 );
        self.last_index = self.last_index.max( -1 );
        self.extra.retain( |key, _| !KNOWN_KEYS.contains( &key.as_str() ) );
        self
    }


    /// Serializes the document as 4-space indented JSON.
    pub fn to_pretty_json( &self ) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent( b"    " );
        let mut serializer = serde_json::Serializer::with_formatter( &mut buf, formatter );
        self.serialize( &mut serializer )?;
        buf.push( b'\n' );
        Ok( buf )
    }
}


fn type_name( value: &Value ) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool( _ ) => "boolean",
        Value::Number( _ ) => "number",
        Value::String( _ ) => "string",
        Value::Array( _ ) => "array",
        Value::Object( _ ) => "object",
    }
}


/// Integer view of a JSON number, truncating floats.
fn number( value: &Value ) -> Option<i64> {
    value.as_i64().or_else( || value.as_f64().map( |f| f as i64 ) )
}


/// Non-negative millisecond position. Negative numbers become 0.
fn position( value: &Value ) -> Option<u64> {
    value.as_u64().or_else( || number( value ).map( |ms| ms.max( 0 ) as u64 ) )
}


fn clamp_volume( volume: i64 ) -> u8 {
    volume.clamp( 0, 100 ) as u8
}


/// Array of strings; non-string items are dropped.
fn string_list( value: Value ) -> Option<Vec<String>> {
    match value {
        Value::Array( items ) => Some(
            items.into_iter()
                .filter_map( |item| match item {
                    Value::String( s ) => Some( s ),
                    _ => None,
                })
                .collect()
        ),
        _ => None,
    }
}


/// Object of string arrays; entries whose value is not an array are dropped.
fn string_list_map( value: Value ) -> Option<BTreeMap<String, Vec<String>>> {
    match value {
        Value::Object( map ) => Some(
            map.into_iter()
                .filter_map( |( key, list )| string_list( list ).map( |list| ( key, list ) ) )
                .collect()
        ),
        _ => None,
    }
}


fn geometry( value: &Value ) -> Option<Geometry> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut out = [ 0i32; 4 ];
    for ( slot, item ) in out.iter_mut().zip( items ) {
        *slot = i32::try_from( number( item )? ).ok()?;
    }
    Some( out )
}


/// Loads and saves a [`SettingsDocument`] at a fixed path.
#[derive( Debug, Clone )]
pub struct SettingsStore {
    path: PathBuf,
}


impl SettingsStore {
    /// Creates a store backed by `path`.
    pub fn new( path: impl Into<PathBuf> ) -> Self {
        Self { path: path.into() }
    }


    /// Returns the platform-conventional settings path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( APP_DIR ).join( SETTINGS_FILE ) )
    }


    /// Gets the backing file path.
    pub fn path( &self ) -> &Path {
        &self.path
    }


    /// Loads settings from disk, or returns defaults if unavailable.
    pub fn load( &self ) -> SettingsDocument {
        if !self.path.exists() {
            tracing::debug!( "No settings at {:?}, using defaults", self.path );
            return SettingsDocument::default();
        }

        let contents = match fs::read_to_string( &self.path ) {
            Ok( contents ) => contents,
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                return SettingsDocument::default();
            }
        };

        match serde_json::from_str::<Value>( &contents ) {
            Ok( value ) => SettingsDocument::from_value( value ),
            Err( e ) => {
                tracing::warn!( "Failed to parse settings: {}", e );
                SettingsDocument::default()
            }
        }
    }


    /// Saves settings to disk.
    ///
    /// Writes a temporary file next to the destination and renames it into
    /// place. If that fails the file is overwritten directly. Errors are
    /// logged, never returned.
    pub fn save( &self, doc: &SettingsDocument ) {
        let doc = doc.clone().validated();
        let bytes = match doc.to_pretty_json() {
            Ok( bytes ) => bytes,
            Err( e ) => {
                tracing::error!( "Failed to serialize settings: {}", e );
                return;
            }
        };

        self.write_with_fallback( &bytes, |bytes| self.save_atomic( bytes ) );
    }


    fn write_with_fallback(
        &self,
        bytes: &[u8],
        atomic: impl FnOnce( &[u8] ) -> Result<(), SettingsError>,
    ) {
        match atomic( bytes ) {
            Ok(()) => tracing::debug!( "Saved settings to {:?}", self.path ),
            Err( e ) => {
                tracing::warn!( "Atomic settings save failed: {}", e );
                if let Err( e ) = fs::write( &self.path, bytes ) {
                    tracing::error!( "Could not save settings: {}", e );
                }
            }
        }
    }


    fn save_atomic( &self, bytes: &[u8] ) -> Result<(), SettingsError> {
        let dir = self.path.parent()
            .filter( |p| !p.as_os_str().is_empty() )
            .unwrap_or( Path::new( "." ) );

        if !dir.exists() {
            fs::create_dir_all( dir )?;
        }

        // The temp file deletes itself on drop, including when persist fails.
        let mut tmp = tempfile::Builder::new()
            .prefix( ".settings" )
            .suffix( ".tmp" )
            .tempfile_in( dir )?;
        tmp.write_all( bytes )?;
        tmp.as_file().sync_all()?;
        tmp.persist( &self.path )?;
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;


    fn store_with( contents: &str ) -> ( tempfile::TempDir, SettingsStore ) {
        let dir = tempdir().expect( "tempdir" );
        let path = dir.path().join( SETTINGS_FILE );
        fs::write( &path, contents ).expect( "write" );
        ( dir, SettingsStore::new( path ) )
    }


    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().expect( "tempdir" );
        let store = SettingsStore::new( dir.path().join( "nope.json" ) );
        assert_eq!( store.load(), SettingsDocument::default() );
    }


    #[test]
    fn test_empty_object_yields_defaults() {
        let ( _dir, store ) = store_with( "{}" );
        assert_eq!( store.load(), SettingsDocument::default() );
    }


    #[test]
    fn test_corrupt_json_yields_defaults() {
        let ( _dir, store ) = store_with( "{ \"volume\": 40," );
        assert_eq!( store.load(), SettingsDocument::default() );
    }


    #[test]
    fn test_non_object_yields_defaults() {
        let ( _dir, store ) = store_with( "[1, 2, 3]" );
        assert_eq!( store.load(), SettingsDocument::default() );
    }


    #[test]
    fn test_volume_is_clamped() {
        let ( _dir, store ) = store_with( r#"{ "volume": 250 }"# );
        assert_eq!( store.load().volume, 100 );

        let ( _dir, store ) = store_with( r#"{ "volume": -5 }"# );
        assert_eq!( store.load().volume, 0 );

        let ( _dir, store ) = store_with( r#"{ "volume": 42.9 }"# );
        assert_eq!( store.load().volume, 42 );

        let ( _dir, store ) = store_with( r#"{ "volume": "loud" }"# );
        assert_eq!( store.load().volume, DEFAULT_VOLUME );
    }


    #[test]
    fn test_bogus_repeat_mode_is_reset() {
        let ( _dir, store ) = store_with( r#"{ "repeat_mode": "bogus", "shuffle": true }"# );
        let doc = store.load();
        assert_eq!( doc.repeat_mode, RepeatMode::Off );
        assert!( doc.shuffle );
    }


    #[test]
    fn test_fields_are_repaired_independently() {
        let doc = SettingsDocument::from_value( json!({
            "playlist": [ "a.mp3", 3, "b.mp3" ],
            "last_index": "one",
            "last_position": 1500.7,
            "gifs": "cat.gif",
            "song_gifs": { "a.mp3": [ "x.gif" ], "b.mp3": "y.gif" },
            "shuffle": 1,
            "repeat_mode": "all",
            "dock_geometry": [ 10, 20, 300, 200 ],
            "window_geometry": [ 1, 2, 3 ],
            "theme": 7,
        }));

        assert_eq!( doc.playlist, vec![ "a.mp3", "b.mp3" ] );
        assert_eq!( doc.last_index, -1 );
        assert_eq!( doc.last_position, 1500 );
        assert!( doc.gifs.is_empty() );
        assert_eq!( doc.song_gifs.len(), 1 );
        assert_eq!( doc.song_gifs[ "a.mp3" ], vec![ "x.gif" ] );
        assert!( !doc.shuffle );
        assert_eq!( doc.repeat_mode, RepeatMode::All );
        assert_eq!( doc.dock_geometry, Some( [ 10, 20, 300, 200 ] ) );
        assert_eq!( doc.window_geometry, None );
        assert_eq!( doc.theme, "dark" );
    }


    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let ( _dir, store ) = store_with( r#"{ "volume": 30, "equalizer": { "bass": 3 } }"# );
        let doc = store.load();
        assert_eq!( doc.extra.get( "equalizer" ), Some( &json!({ "bass": 3 }) ) );

        store.save( &doc );
        let reloaded = store.load();
        assert_eq!( reloaded.extra.get( "equalizer" ), Some( &json!({ "bass": 3 }) ) );
        assert_eq!( reloaded.volume, 30 );
    }


    #[test]
    fn test_save_then_load_matches_validated() {
        let dir = tempdir().expect( "tempdir" );
        let store = SettingsStore::new( dir.path().join( SETTINGS_FILE ) );

        let mut doc = SettingsDocument {
            playlist: vec![ "a.mp3".into(), "b.mp3".into() ],
            last_index: -9,
            last_position: 4200,
            volume: 180,
            shuffle: true,
            repeat_mode: RepeatMode::One,
            window_geometry: Some( [ 150, 100, 1100, 650 ] ),
            ..SettingsDocument::default()
        };
        doc.song_gifs.insert( "a.mp3".into(), vec![ "dance.gif".into() ] );
        doc.extra.insert( "volume".into(), json!( 5 ) );
        doc.extra.insert( "custom".into(), json!( "kept" ) );

        store.save( &doc );

        let validated = doc.clone().validated();
        assert_eq!( store.load(), validated );
        assert_eq!( validated.clone().validated(), validated );
        assert_eq!( validated.volume, 100 );
        assert_eq!( validated.last_index, -1 );
    }


    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempdir().expect( "tempdir" );
        let nested = dir.path().join( APP_DIR );
        let store = SettingsStore::new( nested.join( SETTINGS_FILE ) );

        store.save( &SettingsDocument::default() );
        store.save( &SettingsDocument::default() );

        let names: Vec<_> = fs::read_dir( &nested )
            .expect( "read_dir" )
            .map( |e| e.expect( "entry" ).file_name() )
            .collect();
        assert_eq!( names, vec![ std::ffi::OsString::from( SETTINGS_FILE ) ] );
    }


    #[test]
    fn test_direct_write_when_atomic_save_fails() {
        let dir = tempdir().expect( "tempdir" );
        let store = SettingsStore::new( dir.path().join( SETTINGS_FILE ) );
        let doc = SettingsDocument {
            volume: 12,
            theme: "light".into(),
            ..SettingsDocument::default()
        };
        let bytes = doc.to_pretty_json().expect( "serialize" );

        store.write_with_fallback( &bytes, |_| {
            Err( SettingsError::Io( std::io::Error::other( "rename refused" ) ) )
        });

        assert_eq!( store.load(), doc );
    }


    #[test]
    fn test_save_onto_directory_is_swallowed() {
        let dir = tempdir().expect( "tempdir" );
        let target = dir.path().join( SETTINGS_FILE );
        fs::create_dir( &target ).expect( "mkdir" );
        let store = SettingsStore::new( &target );

        store.save( &SettingsDocument { volume: 12, ..SettingsDocument::default() } );

        let names: Vec<_> = fs::read_dir( dir.path() )
            .expect( "read_dir" )
            .map( |e| e.expect( "entry" ).file_name() )
            .collect();
        assert_eq!( names, vec![ std::ffi::OsString::from( SETTINGS_FILE ) ] );
        assert!( target.is_dir() );
        assert_eq!( store.load(), SettingsDocument::default() );
    }


    #[test]
    fn test_huge_position_round_trips() {
        let dir = tempdir().expect( "tempdir" );
        let store = SettingsStore::new( dir.path().join( SETTINGS_FILE ) );
        let doc = SettingsDocument { last_position: u64::MAX, ..SettingsDocument::default() };

        store.save( &doc );

        assert_eq!( store.load().last_position, u64::MAX );
        let doc = SettingsDocument::from_value( json!({ "last_position": -20 }) );
        assert_eq!( doc.last_position, 0 );
    }


    #[test]
    fn test_repeat_mode_names_are_exact() {
        for name in [ "ALL", "off", "One", " one" ] {
            let doc = SettingsDocument::from_value( json!({ "repeat_mode": name }) );
            assert_eq!( doc.repeat_mode, RepeatMode::Off, "{name}" );
        }
        let doc = SettingsDocument::from_value( json!({ "repeat_mode": "one" }) );
        assert_eq!( doc.repeat_mode, RepeatMode::One );
    }


    #[test]
    fn test_saved_file_is_pretty_printed() {
        let dir = tempdir().expect( "tempdir" );
        let store = SettingsStore::new( dir.path().join( SETTINGS_FILE ) );
        store.save( &SettingsDocument::default() );

        let text = fs::read_to_string( store.path() ).expect( "read" );
        assert!( text.starts_with( "{\n    \"playlist\": []," ) );
        assert!( text.contains( "\"repeat_mode\": \"none\"" ) );
        assert!( text.contains( "\"dock_geometry\": null" ) );
    }
}
