//! Clock-synchronized judgment engine for a rhythm-practice mini-game.
//!
//! A generated [`game::chart::NoteChart`] is played against a single
//! [`game::timing::Transport`]; player attempts are buffered and judged once
//! per tick by [`game::gameplay::GameLoop`], which also auto-misses notes
//! that scroll past and drives the [`game::session::Session`] state machine
//! to a terminal outcome. Rendering and audio are left to whoever consumes
//! the emitted [`game::session::GameEvent`]s.

pub mod config;
pub mod core;
pub mod game;
