//! Media discovery
//!
//! Expands the files and folders a user hands us into track or GIF
//! identifiers, filtered by extension.

use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Audio extensions accepted when adding songs.
const AUDIO_EXTENSIONS: &[&str] = &[ "mp3", "wav", "ogg", "flac", "m4a", "aac", "wma" ];

/// Extensions accepted when adding GIFs.
const GIF_EXTENSIONS: &[&str] = &[ "gif" ];


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Kind of media being collected.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum MediaKind {
    Audio,
    Gif,
}


impl MediaKind {
    fn extensions( self ) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => AUDIO_EXTENSIONS,
            MediaKind::Gif => GIF_EXTENSIONS,
        }
    }


    /// Checks if a file has an extension of this kind.
    pub fn matches( self, path: &Path ) -> bool {
        path.extension()
            .and_then( |e| e.to_str() )
            .map( |e| self.extensions().contains( &e.to_lowercase().as_str() ) )
            .unwrap_or( false )
    }
}


/// Collects identifiers of `kind` from files and directories.
///
/// Files are kept if their extension matches; directories are walked
/// recursively in name order.
pub fn collect<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    kind: MediaKind,
) -> Result<Vec<String>, LibraryError> {
    let mut found = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            tracing::info!( "Scanning: {:?}", path );
            scan_recursive( path, kind, &mut found )?;
        } else if path.exists() {
            if kind.matches( path ) {
                found.push( identifier( path ) );
            } else {
                tracing::debug!( "Skipping {:?}: not a {:?} file", path, kind );
            }
        } else {
            return Err( LibraryError::NotFound( path.to_path_buf() ) );
        }
    }

    tracing::info!( "Found {} {:?} file(s)", found.len(), kind );
    Ok( found )
}


fn scan_recursive(
    dir: &Path,
    kind: MediaKind,
    found: &mut Vec<String>,
) -> Result<(), LibraryError> {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return Ok(()); // Skip inaccessible directories
        }
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map( |entry| entry.path() ).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            scan_recursive( &path, kind, found )?;
        } else if kind.matches( &path ) {
            found.push( identifier( &path ) );
        }
    }

    Ok(())
}


fn identifier( path: &Path ) -> String {
    path.to_string_lossy().into_owned()
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;


    #[test]
    fn test_collect_walks_directories_in_order() {
        let dir = tempdir().expect( "tempdir" );
        let album = dir.path().join( "album" );
        fs::create_dir( &album ).expect( "mkdir" );
        fs::write( album.join( "02.flac" ), b"" ).expect( "write" );
        fs::write( album.join( "01.MP3" ), b"" ).expect( "write" );
        fs::write( album.join( "cover.jpg" ), b"" ).expect( "write" );
        fs::write( dir.path().join( "intro.ogg" ), b"" ).expect( "write" );

        let found = collect( [ dir.path() ], MediaKind::Audio ).expect( "collect" );

        let names: Vec<_> = found.iter()
            .map( |p| Path::new( p ).file_name().unwrap().to_string_lossy().into_owned() )
            .collect();
        assert_eq!( names, vec![ "01.MP3", "02.flac", "intro.ogg" ] );
    }


    #[test]
    fn test_collect_filters_single_files_by_kind() {
        let dir = tempdir().expect( "tempdir" );
        let gif = dir.path().join( "cat.gif" );
        let song = dir.path().join( "song.mp3" );
        fs::write( &gif, b"" ).expect( "write" );
        fs::write( &song, b"" ).expect( "write" );

        let gifs = collect( [ &gif, &song ], MediaKind::Gif ).expect( "collect" );
        assert_eq!( gifs, vec![ gif.to_string_lossy().into_owned() ] );
    }


    #[test]
    fn test_collect_missing_path() {
        let dir = tempdir().expect( "tempdir" );
        let missing = dir.path().join( "missing.mp3" );
        let result = collect( [ &missing ], MediaKind::Audio );
        assert!( matches!( result, Err( LibraryError::NotFound( p ) ) if p == missing ) );
    }
}
