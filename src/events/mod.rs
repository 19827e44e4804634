//! # Events Module
//!
//! Channel-based progress reporting for batch matching.
//!
//! ## Design
//! The pipeline emits events through a crossbeam channel, so the CLI
//! (or an upload service) can show progress without the library
//! knowing how it is displayed.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Describe(DescribeEvent::Progress(p)) => {
//!                 println!("Described {}/{}", p.completed, p.total)
//!             }
//!             Event::Match(MatchEvent::PossibleDuplicate { candidate_id, .. }) => {
//!                 println!("{} needs review", candidate_id)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&corpus, &candidates, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
