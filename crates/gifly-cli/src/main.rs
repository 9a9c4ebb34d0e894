//! Gifly CLI - terminal front-end for the Gifly music player

mod app;
mod cli;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::time::{ self, Instant, MissedTickBehavior };
use tracing::Level;

use app::App;
use cli::Args;


/// How often the playback clock advances.
const TICK_INTERVAL: Duration = Duration::from_millis( 250 );

/// How often settings are flushed even without user actions.
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs( 10 );


fn init_logging( verbosity: u8 ) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level( level )
        .with_target( false )
        .with_writer( std::io::stderr )
        .init();
}


fn print_lines( lines: Vec<String> ) {
    for line in lines {
        println!( "{}", line );
    }
}


#[tokio::main( flavor = "current_thread" )]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( args.verbose );

    let mut app = App::new( &args )?;
    println!( "{}", app.status_line() );
    println!( "Type /help for commands." );

    let mut lines = BufReader::new( tokio::io::stdin() ).lines();

    let mut tick = time::interval( TICK_INTERVAL );
    tick.set_missed_tick_behavior( MissedTickBehavior::Delay );
    let mut autosave = time::interval_at( Instant::now() + AUTOSAVE_INTERVAL, AUTOSAVE_INTERVAL );
    let mut last_tick = Instant::now();

    // Main loop
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some( line ) => print_lines( app.execute( &line ) ),
                    None => break,
                }
            }
            now = tick.tick() => {
                let elapsed = now.saturating_duration_since( last_tick );
                last_tick = now;
                print_lines( app.tick( elapsed ) );
            }
            _ = autosave.tick() => {
                tracing::debug!( "Autosaving settings" );
                app.save_state();
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!( "Interrupted" );
                break;
            }
        }

        if app.should_quit() {
            break;
        }
    }

    // Save session before quitting
    app.save_state();
    Ok(())
}
