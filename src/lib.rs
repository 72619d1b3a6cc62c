//! # Quizhost Engine Library
//!
//! This library provides the round state machine and scoring engine for a
//! live team trivia host tool. It handles team registration, round
//! configuration and presets, fair question selection, the per-round
//! session state machine with its countdown, the reversible scoring
//! ledger, and versioned snapshot persistence. Rendering, input handling,
//! and storage backends are left to the embedding application.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod constants;

pub mod bank;
pub mod host;
pub mod ledger;
pub mod round;
pub mod selector;
pub mod session;
pub mod snapshot;
pub mod teams;
pub mod timer;
