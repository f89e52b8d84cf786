#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Nothing in this crate synchronises user state.
//! [`lock`] only provides the policies that `fanout` signals are generic over.

pub mod cow;
pub mod identity;
pub mod lock;
pub mod track;

#[doc = include_str!("../README.md")]
mod readme {}
