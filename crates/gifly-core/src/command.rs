//! Slash command parsing.
//!
//! Commands are parsed from a line of user input (the leading `/` is
//! optional) and executed by the front-end against the controller and the
//! settings document. Track and GIF indices are 1-based, as listed.

use std::path::PathBuf;

use thiserror::Error;

use crate::playlist::RepeatMode;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// GIF library sub-commands.
#[derive( Debug, Clone, PartialEq )]
pub enum GifCommand {
    Add { path: PathBuf },
    Remove { index: usize },
    Clear,
    Assign { path: PathBuf },
    Unassign,
    List,
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Playlist commands
    Add { path: PathBuf },
    Remove { index: usize },
    Clear,
    List { filter: Option<String> },
    Goto { index: usize },
    Save { name: String },
    Load { name: String },
    Shuffle { enabled: Option<bool> },
    Repeat { mode: Option<RepeatMode> },

    // Playback commands
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Prev,
    Seek { position_ms: u64 },
    Volume { level: Option<i64> },

    // GIF commands
    Gif( GifCommand ),

    // Other commands
    Status,
    Help,
    Quit,
}


impl Command {
    /// Parses a command string.
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let input = input.strip_prefix( '/' ).unwrap_or( input );
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Playlist commands
            "add" | "a" => Ok( Command::Add { path: PathBuf::from( required( args, "path" )? ) } ),
            "remove" | "rm" | "del" => Ok( Command::Remove { index: parse_index( args )? } ),
            "clear" | "cl" => Ok( Command::Clear ),
            "list" | "ls" => Ok( Command::List { filter: args.map( str::to_string ) } ),
            "search" | "find" => Ok( Command::List { filter: Some( required( args, "search term" )?.to_string() ) } ),
            "goto" | "go" => Ok( Command::Goto { index: parse_index( args )? } ),
            "save" => Ok( Command::Save { name: required( args, "playlist name" )?.to_string() } ),
            "load" => Ok( Command::Load { name: required( args, "playlist name" )?.to_string() } ),
            "shuffle" | "sh" => {
                let enabled = args.map( parse_switch ).transpose()?;
                Ok( Command::Shuffle { enabled } )
            }
            "repeat" | "rep" => {
                let mode = args
                    .map( |s| s.parse::<RepeatMode>() )
                    .transpose()
                    .map_err( |e| CommandError::InvalidArgument( e.to_string() ) )?;
                Ok( Command::Repeat { mode } )
            }

            // Playback commands
            "play" | "p" => Ok( Command::Play ),
            "pause" | "pa" => Ok( Command::Pause ),
            "toggle" | "t" => Ok( Command::Toggle ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let position = parse_time( required( args, "time position" )? )?;
                Ok( Command::Seek { position_ms: position } )
            }
            "vol" | "volume" => {
                let level = args
                    .map( |s| s.parse::<i64>()
                        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", s ) ) ) )
                    .transpose()?;
                Ok( Command::Volume { level } )
            }

            "gif" | "g" => Ok( Command::Gif( parse_gif( args )? ) ),

            "status" | "now" => Ok( Command::Status ),
            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns true if running the command can change persisted state.
    pub fn mutates( &self ) -> bool {
        !matches!(
            self,
            Command::List { .. } | Command::Status | Command::Help | Command::Gif( GifCommand::List )
        )
    }
}


fn required<'a>( args: Option<&'a str>, what: &str ) -> Result<&'a str, CommandError> {
    args.ok_or_else( || CommandError::MissingArgument( what.into() ) )
}


/// Parses a 1-based index into a 0-based one.
fn parse_index( args: Option<&str> ) -> Result<usize, CommandError> {
    let raw = required( args, "track number" )?;
    match raw.parse::<usize>() {
        Ok( n ) if n > 0 => Ok( n - 1 ),
        _ => Err( CommandError::InvalidArgument( format!( "Invalid number: {}", raw ) ) ),
    }
}


fn parse_switch( s: &str ) -> Result<bool, CommandError> {
    match s.to_lowercase().as_str() {
        "on" | "1" | "true" => Ok( true ),
        "off" | "0" | "false" => Ok( false ),
        _ => Err( CommandError::InvalidArgument( format!( "Expected 'on' or 'off', got '{}'", s ) ) ),
    }
}


fn parse_gif( args: Option<&str> ) -> Result<GifCommand, CommandError> {
    let args = required( args, "gif sub-command" )?;
    let mut parts = args.splitn( 2, ' ' );
    let sub = parts.next().unwrap_or( "" ).to_lowercase();
    let rest = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

    match sub.as_str() {
        "add" => Ok( GifCommand::Add { path: PathBuf::from( required( rest, "path" )? ) } ),
        "rm" | "remove" => Ok( GifCommand::Remove { index: parse_index( rest )? } ),
        "clear" => Ok( GifCommand::Clear ),
        "assign" => Ok( GifCommand::Assign { path: PathBuf::from( required( rest, "path" )? ) } ),
        "unassign" => Ok( GifCommand::Unassign ),
        "list" | "ls" => Ok( GifCommand::List ),
        other => Err( CommandError::Unknown( format!( "gif {}", other ) ) ),
    }
}


/// Parses a time string like "1:30" or "90" into milliseconds.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
fn parse_time( s: &str ) -> Result<u64, CommandError> {
    let s = s.trim();

    let seconds = if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        minutes.checked_mul( 60 ).and_then( |m| m.checked_add( seconds ) )
    } else {
        Some( s.parse::<u64>()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )? )
    };

    seconds
        .and_then( |secs| secs.checked_mul( 1000 ) )
        .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )
}


/// Formats milliseconds as `M:SS`. Negative values render as `0:00`.
pub fn format_time( milliseconds: i64 ) -> String {
    if milliseconds < 0 {
        return "0:00".to_string();
    }
    let seconds = milliseconds / 1000;
    format!( "{}:{:02}", seconds / 60, seconds % 60 )
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Playlist Commands:
  /add <path>          Add a file or folder of songs
  /remove <n>          Remove track n
  /clear               Clear playlist
  /list [term]         Show playlist, optionally filtered by name
  /find <term>         Same as /list <term>
  /goto <n>            Play track n
  /save <name>         Save playlist under a name
  /load <name>         Load a named playlist
  /shuffle [on|off]    Toggle or set shuffle
  /repeat [mode]       Cycle or set repeat (none/one/all)

Playback Commands:
  /play  /pause  /toggle  /stop
  /next  /prev
  /seek <time>         Seek to position (e.g., 1:30)
  /vol [0-100]         Show or set volume

GIF Commands:
  /gif add <path>      Add default GIFs
  /gif rm <n>          Remove default GIF n
  /gif clear           Remove all default GIFs
  /gif assign <path>   Attach a GIF to the current track
  /gif unassign        Detach all GIFs from the current track
  /gif list            Show GIFs for the current track

Other Commands:
  /status              Show what is playing
  /help                Show this help
  /quit                Save and exit"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_add() {
        let cmd = Command::parse( "add /path/to/file.mp3" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/path/to/file.mp3" ) } );
    }


    #[test]
    fn test_parse_with_slash_prefix() {
        let cmd = Command::parse( "/a /music" ).unwrap();
        assert_eq!( cmd, Command::Add { path: PathBuf::from( "/music" ) } );
    }


    #[test]
    fn test_parse_index_is_one_based() {
        assert_eq!( Command::parse( "rm 1" ).unwrap(), Command::Remove { index: 0 } );
        assert_eq!( Command::parse( "goto 3" ).unwrap(), Command::Goto { index: 2 } );
        assert!( matches!( Command::parse( "rm 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position_ms: 90_000 } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position_ms: 45_000 } );
    }


    #[test]
    fn test_parse_seek_out_of_range() {
        let result = Command::parse( "seek 20000000000000000" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );

        let result = Command::parse( "seek 307445734561825860:00" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_repeat_with_mode() {
        let cmd = Command::parse( "repeat all" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: Some( RepeatMode::All ) } );
    }


    #[test]
    fn test_parse_repeat_toggle() {
        let cmd = Command::parse( "repeat" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: None } );
    }


    #[test]
    fn test_parse_repeat_invalid() {
        let result = Command::parse( "repeat sometimes" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_shuffle() {
        assert_eq!( Command::parse( "shuffle" ).unwrap(), Command::Shuffle { enabled: None } );
        assert_eq!( Command::parse( "sh on" ).unwrap(), Command::Shuffle { enabled: Some( true ) } );
    }


    #[test]
    fn test_parse_volume_allows_out_of_range() {
        let cmd = Command::parse( "vol 250" ).unwrap();
        assert_eq!( cmd, Command::Volume { level: Some( 250 ) } );
    }


    #[test]
    fn test_parse_gif() {
        assert_eq!(
            Command::parse( "gif assign /gifs/cat.gif" ).unwrap(),
            Command::Gif( GifCommand::Assign { path: PathBuf::from( "/gifs/cat.gif" ) } )
        );
        assert_eq!( Command::parse( "gif rm 2" ).unwrap(), Command::Gif( GifCommand::Remove { index: 1 } ) );
        assert!( matches!( Command::parse( "gif" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_list_filter() {
        assert_eq!( Command::parse( "ls" ).unwrap(), Command::List { filter: None } );
        assert_eq!(
            Command::parse( "list Daft Punk" ).unwrap(),
            Command::List { filter: Some( "Daft Punk".to_string() ) }
        );
        assert_eq!(
            Command::parse( "/find love" ).unwrap(),
            Command::List { filter: Some( "love".to_string() ) }
        );
        assert!( matches!( Command::parse( "search" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "add" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_mutates() {
        assert!( Command::parse( "next" ).unwrap().mutates() );
        assert!( !Command::parse( "list" ).unwrap().mutates() );
        assert!( !Command::parse( "find love" ).unwrap().mutates() );
    }


    #[test]
    fn test_format_time() {
        assert_eq!( format_time( 0 ), "0:00" );
        assert_eq!( format_time( 61_500 ), "1:01" );
        assert_eq!( format_time( 600_000 ), "10:00" );
        assert_eq!( format_time( -1 ), "0:00" );
    }
}
