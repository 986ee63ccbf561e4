//! Buffered multi-value streaming primitive and combinators for weft.
//!
//! A [`Producer`] streams any number of updates and then closes exactly
//! once with a success or failure; a [`Channel`] is its read-only view.
//! Joining subscribers first replay the stream's bounded buffer (the
//! last `buffer_size` updates, fixed at construction), then receive live
//! updates in writer-call order, then the terminal value — each exactly
//! once.
//!
//! ```rust
//! use weft::executor::InlineExecutor;
//! use weft_channel::Producer;
//!
//! let producer: Producer<u32, &'static str> = Producer::new();
//! let channel = producer.channel();
//!
//! producer.update(7);
//! producer.succeed("done");
//! assert!(!producer.update(8)); // closed streams reject updates
//!
//! assert_eq!(channel.terminal().unwrap().success(), Some(&"done"));
//! ```
//!
//! The [`combine`] module pairs streams: [`merge`], [`merge_either`],
//! [`zip`], [`sample`], [`combine_latest`], and the timer-driven
//! [`debounce`] / [`throttle`].

#![warn(missing_docs)]

pub mod combine;
pub mod event;
mod stream;

pub use combine::{
    combine_latest, debounce, merge, merge_either, sample, throttle, zip, zip_with_capacity,
};
pub use event::StreamEvent;
pub use stream::{Channel, Producer, DEFAULT_BUFFER_SIZE};
