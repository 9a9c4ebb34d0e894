//! Gifly Core - Playback control and persistence
//!
//! This crate provides the playlist state machine, the seam to a media
//! engine, the settings store, and the GIF library behind the dock.

pub mod command;
pub mod controller;
pub mod engine;
pub mod gifs;
pub mod library;
pub mod playlist;
pub mod session;
pub mod settings;

pub use command::{ Command, CommandError, GifCommand };
pub use controller::{ PlaybackController, PlayerEvent };
pub use engine::{ EngineNotification, MediaEngine, PlaybackState, VirtualEngine };
pub use gifs::{ GifDock, GifLibrary };
pub use library::{ LibraryError, MediaKind };
pub use playlist::{ Playlist, RepeatMode };
pub use settings::{ SettingsDocument, SettingsError, SettingsStore };
