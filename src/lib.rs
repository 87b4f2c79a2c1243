//! Sync core for a terminal Kanban board: reconciles local Markdown task
//! files with a remote project board.
//!
//! This crate is a library only — it has no CLI or TUI of its own. A host
//! binary wires [`logging::init_logging`], loads a
//! [`config::Config`], and drives [`board::BoardService`],
//! [`task_service::TaskService`], and [`sync::SyncEngine`] against a shared
//! [`storage::FilesystemStore`].

pub mod board;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod frontmatter;
pub mod logging;
pub mod model;
pub mod remote;
pub mod slug;
pub mod storage;
pub mod sync;
pub mod task_service;
pub mod template;
pub mod util;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{Result, SltasksError};
pub use model::{ProviderData, Task};
