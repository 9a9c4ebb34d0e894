//! GIF library
//!
//! Tracks the default GIF list and the GIFs associated with individual
//! tracks, and decides which list the floating dock should cycle through.

use std::collections::BTreeMap;

use crate::settings::SettingsDocument;


/// The floating GIF overlay.
pub trait GifDock {
    /// Shows `gifs` for `track`. `track` is empty when nothing is current.
    fn update_for_track( &mut self, track: &str, gifs: &[String] );

    /// Replaces the fallback list used for tracks without GIFs of their own.
    fn update_default_gifs( &mut self, gifs: &[String] );
}


/// Default GIFs plus per-track associations.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct GifLibrary {
    defaults: Vec<String>,
    per_track: BTreeMap<String, Vec<String>>,
}


impl GifLibrary {
    pub fn new() -> Self {
        Self::default()
    }


    /// Reads the `gifs` and `song_gifs` keys of a settings document.
    pub fn from_document( doc: &SettingsDocument ) -> Self {
        Self {
            defaults: doc.gifs.clone(),
            per_track: doc.song_gifs.clone(),
        }
    }


    /// Writes the library back into the `gifs` and `song_gifs` keys.
    pub fn write_to( &self, doc: &mut SettingsDocument ) {
        doc.gifs = self.defaults.clone();
        doc.song_gifs = self.per_track.clone();
    }


    /// Adds GIFs to the default list, skipping ones already present.
    ///
    /// @returns The number of GIFs added
    pub fn add_defaults( &mut self, gifs: impl IntoIterator<Item = String> ) -> usize {
        let mut added = 0;
        for gif in gifs {
            if !self.defaults.contains( &gif ) {
                self.defaults.push( gif );
                added += 1;
            }
        }
        added
    }


    /// Removes a default GIF by index.
    pub fn remove_default( &mut self, index: usize ) -> Option<String> {
        ( index < self.defaults.len() ).then( || self.defaults.remove( index ) )
    }


    pub fn clear_defaults( &mut self ) {
        self.defaults.clear();
    }


    pub fn defaults( &self ) -> &[String] {
        &self.defaults
    }


    /// Associates `gif` with `track`. Returns false if it was already there.
    pub fn assign( &mut self, track: &str, gif: String ) -> bool {
        let list = self.per_track.entry( track.to_string() ).or_default();
        if list.contains( &gif ) {
            return false;
        }
        list.push( gif );
        true
    }


    /// Drops every association of `track`.
    pub fn unassign( &mut self, track: &str ) -> bool {
        self.per_track.remove( track ).is_some()
    }


    /// Forgets a track that left the playlist.
    pub fn forget_track( &mut self, track: &str ) {
        self.per_track.remove( track );
    }


    /// Forgets every track association (the playlist was cleared).
    pub fn forget_all_tracks( &mut self ) {
        self.per_track.clear();
    }


    /// GIFs associated with `track`, possibly empty.
    pub fn for_track( &self, track: &str ) -> &[String] {
        self.per_track.get( track ).map( Vec::as_slice ).unwrap_or( &[] )
    }


    /// The list the dock should show for `track`: its own GIFs if it has
    /// any, the defaults otherwise.
    pub fn resolve( &self, track: Option<&str> ) -> &[String] {
        match track.map( |t| self.for_track( t ) ) {
            Some( own ) if !own.is_empty() => own,
            _ => self.defaults.as_slice(),
        }
    }


    /// Pushes the current state to a dock.
    pub fn show_on( &self, dock: &mut dyn GifDock, track: Option<&str> ) {
        dock.update_for_track( track.unwrap_or( "" ), self.for_track( track.unwrap_or( "" ) ) );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[derive( Default )]
    struct RecordingDock {
        shown: Vec<( String, Vec<String> )>,
    }


    impl GifDock for RecordingDock {
        fn update_for_track( &mut self, track: &str, gifs: &[String] ) {
            self.shown.push(( track.to_string(), gifs.to_vec() ));
        }


        fn update_default_gifs( &mut self, _gifs: &[String] ) {}
    }


    fn library() -> GifLibrary {
        let mut library = GifLibrary::new();
        library.add_defaults( vec![ "cat.gif".to_string(), "dog.gif".to_string() ] );
        library.assign( "a.mp3", "dance.gif".to_string() );
        library
    }


    #[test]
    fn test_add_defaults_skips_duplicates() {
        let mut library = library();
        let added = library.add_defaults( vec![ "cat.gif".to_string(), "fox.gif".to_string() ] );
        assert_eq!( added, 1 );
        assert_eq!( library.defaults(), [ "cat.gif", "dog.gif", "fox.gif" ] );
    }


    #[test]
    fn test_remove_default_out_of_range() {
        let mut library = library();
        assert_eq!( library.remove_default( 9 ), None );
        assert_eq!( library.remove_default( 0 ).as_deref(), Some( "cat.gif" ) );
        assert_eq!( library.defaults(), [ "dog.gif" ] );
    }


    #[test]
    fn test_resolve_prefers_track_gifs() {
        let library = library();
        assert_eq!( library.resolve( Some( "a.mp3" ) ), [ "dance.gif" ] );
        assert_eq!( library.resolve( Some( "b.mp3" ) ), [ "cat.gif", "dog.gif" ] );
        assert_eq!( library.resolve( None ), [ "cat.gif", "dog.gif" ] );
    }


    #[test]
    fn test_assign_is_unique() {
        let mut library = library();
        assert!( !library.assign( "a.mp3", "dance.gif".to_string() ) );
        assert!( library.assign( "a.mp3", "spin.gif".to_string() ) );
        assert_eq!( library.for_track( "a.mp3" ), [ "dance.gif", "spin.gif" ] );
    }


    #[test]
    fn test_forget_track() {
        let mut library = library();
        library.forget_track( "a.mp3" );
        assert!( library.for_track( "a.mp3" ).is_empty() );
        assert!( !library.unassign( "a.mp3" ) );
    }


    #[test]
    fn test_document_round_trip() {
        let library = library();
        let mut doc = SettingsDocument::default();
        library.write_to( &mut doc );
        assert_eq!( doc.gifs, vec![ "cat.gif", "dog.gif" ] );
        assert_eq!( GifLibrary::from_document( &doc ), library );
    }


    #[test]
    fn test_show_on_dock_passes_track_gifs() {
        let library = library();
        let mut dock = RecordingDock::default();

        library.show_on( &mut dock, Some( "a.mp3" ) );
        library.show_on( &mut dock, None );

        assert_eq!( dock.shown, vec![
            ( "a.mp3".to_string(), vec![ "dance.gif".to_string() ] ),
            ( String::new(), Vec::new() ),
        ]);
    }
}
