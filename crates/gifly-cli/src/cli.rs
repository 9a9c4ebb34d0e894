//! Command-line argument parsing for Gifly.

use std::path::PathBuf;

use clap::{ ArgAction, Parser };


/// Gifly - a music player that pairs songs with GIFs.
#[derive( Parser, Debug )]
#[command( name = "gifly" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Settings file to use instead of the platform default.
    #[arg( short, long )]
    pub settings: Option<PathBuf>,

    /// Length in seconds given to every track by the playback clock.
    #[arg( long, default_value_t = 180 )]
    pub track_length: u64,

    /// Start playing right away.
    #[arg( short, long )]
    pub play: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg( short, long, action = ArgAction::Count )]
    pub verbose: u8,

    /// Songs or folders to add to the playlist on startup.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}
