//! Session persistence
//!
//! Moves playback state between a [`PlaybackController`] and the settings
//! document: restored once at startup, captured before every save.

use crate::controller::PlaybackController;
use crate::engine::MediaEngine;
use crate::settings::SettingsDocument;


/// Applies a loaded settings document to a fresh controller.
///
/// The saved track is selected (not played) and the saved position is
/// restored on it.
pub fn restore<E: MediaEngine>( controller: &mut PlaybackController<E>, doc: &SettingsDocument ) {
    if !doc.playlist.is_empty() {
        controller.load( doc.playlist.iter().cloned() );
    }

    if let Ok( index ) = usize::try_from( doc.last_index ) {
        if controller.select( index ) {
            controller.seek( doc.last_position );
        }
    }

    controller.set_volume( i64::from( doc.volume ) );
    controller.set_shuffle( doc.shuffle );
    controller.set_repeat( doc.repeat_mode );

    tracing::info!(
        "Restored session: {} track(s), index {}, shuffle={}, repeat={}, volume={}",
        controller.tracks().len(),
        doc.last_index,
        doc.shuffle,
        doc.repeat_mode,
        doc.volume
    );
}


/// Writes the controller's state into `doc`.
///
/// Geometry, GIFs, theme and unknown keys are left as they are.
pub fn capture<E: MediaEngine>( controller: &PlaybackController<E>, doc: &mut SettingsDocument ) {
    doc.playlist = controller.tracks().to_vec();
    doc.last_index = controller.cursor().map_or( -1, |i| i as i64 );
    doc.last_position = if controller.current_track().is_some() {
        controller.position()
    } else {
        0
    };
    doc.volume = controller.volume();
    doc.shuffle = controller.shuffle();
    doc.repeat_mode = controller.repeat();
}


/// Stores the current track list under `name` in the `playlists` key.
pub fn save_named<E: MediaEngine>( controller: &PlaybackController<E>, doc: &mut SettingsDocument, name: &str ) {
    doc.playlists.insert( name.to_string(), controller.tracks().to_vec() );
}


/// Replaces the playlist with the one saved under `name`.
///
/// @returns false if no playlist has that name
pub fn load_named<E: MediaEngine>( controller: &mut PlaybackController<E>, doc: &SettingsDocument, name: &str ) -> bool {
    let Some( tracks ) = doc.playlists.get( name ) else {
        return false;
    };
    controller.clear();
    controller.load( tracks.iter().cloned() );
    true
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::engine::{ PlaybackState, VirtualEngine };
    use crate::playlist::RepeatMode;


    fn controller() -> PlaybackController<VirtualEngine> {
        PlaybackController::with_seed( VirtualEngine::default(), 0 )
    }


    #[test]
    fn test_restore_selects_saved_track_and_position() {
        let doc = SettingsDocument {
            playlist: vec![ "a".into(), "b".into(), "c".into() ],
            last_index: 1,
            last_position: 30_000,
            volume: 35,
            shuffle: true,
            repeat_mode: RepeatMode::All,
            ..SettingsDocument::default()
        };
        let mut controller = controller();

        restore( &mut controller, &doc );

        assert_eq!( controller.cursor(), Some( 1 ) );
        assert_eq!( controller.position(), 30_000 );
        assert_eq!( controller.state(), PlaybackState::Stopped );
        assert_eq!( controller.volume(), 35 );
        assert!( controller.shuffle() );
        assert_eq!( controller.repeat(), RepeatMode::All );
    }


    #[test]
    fn test_restore_ignores_out_of_range_index() {
        let doc = SettingsDocument {
            playlist: vec![ "a".into() ],
            last_index: 4,
            last_position: 500,
            ..SettingsDocument::default()
        };
        let mut controller = controller();

        restore( &mut controller, &doc );

        assert_eq!( controller.cursor(), Some( 0 ) );
        assert_eq!( controller.position(), 0 );
    }


    #[test]
    fn test_capture_round_trips_through_restore() {
        let mut source = controller();
        source.load( vec![ "a".to_string(), "b".to_string() ] );
        source.select( 1 );
        source.seek( 1234 );
        source.set_volume( 55 );
        source.set_repeat( RepeatMode::One );

        let mut doc = SettingsDocument {
            theme: "light".into(),
            ..SettingsDocument::default()
        };
        capture( &source, &mut doc );

        assert_eq!( doc.last_index, 1 );
        assert_eq!( doc.last_position, 1234 );
        assert_eq!( doc.theme, "light" );

        let mut restored = controller();
        restore( &mut restored, &doc );
        assert_eq!( restored.tracks(), source.tracks() );
        assert_eq!( restored.cursor(), Some( 1 ) );
        assert_eq!( restored.repeat(), RepeatMode::One );
        assert_eq!( restored.volume(), 55 );
    }


    #[test]
    fn test_capture_empty_playlist() {
        let mut doc = SettingsDocument {
            last_index: 3,
            last_position: 99,
            ..SettingsDocument::default()
        };
        capture( &controller(), &mut doc );
        assert_eq!( doc.last_index, -1 );
        assert_eq!( doc.last_position, 0 );
    }


    #[test]
    fn test_named_playlists() {
        let mut controller = controller();
        controller.load( vec![ "a".to_string(), "b".to_string() ] );
        let mut doc = SettingsDocument::default();

        save_named( &controller, &mut doc, "road trip" );
        controller.clear();
        controller.load( vec![ "z".to_string() ] );

        assert!( !load_named( &mut controller, &doc, "missing" ) );
        assert!( load_named( &mut controller, &doc, "road trip" ) );
        assert_eq!( controller.tracks(), [ "a", "b" ] );
        assert_eq!( controller.cursor(), Some( 0 ) );
    }
}
