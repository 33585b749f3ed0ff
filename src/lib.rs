//! # nanoshell - embedded command shell engine
//!
//! An interactive command shell for resource-constrained devices. The
//! engine interprets a raw byte stream one byte at a time, provides
//! line editing, history and tab completion over it, and dispatches
//! completed lines against a static registry of commands, variables,
//! key bindings and user accounts. This library is designed for
//! embedded systems and supports `no_std` environments.
//!
//! ## Features
//!
//! ### Line engine
//! - **Byte-at-a-time input**: feed bytes from any transport (UART,
//!   USB CDC, telnet), no blocking reads required
//! - **Line editing**: cursor movement, backspace/delete, insertion at
//!   the cursor, Ctrl-C cancel
//! - **History**: fixed-depth ring navigated with the arrow keys
//! - **Tab completion**: prefix completion over the registry
//!
//! ### Dispatch
//! - **Static registry**: commands, variables, key bindings and user
//!   accounts declared as `const` descriptor tables
//! - **Typed handlers**: tokens marshalled to declared parameter types
//!   (integers in four radixes, floats, chars, strings, packed arrays,
//!   `$variable` references)
//! - **Permission model**: per-descriptor permission ceilings checked
//!   against the logged-in user
//!
//! ### Logging
//! - Leveled broadcast to multiple sinks with advisory lock hooks
//! - Hex dump rendering of memory regions
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! nanoshell = "0.1.0"
//! ```
//!
//! ### Basic shell example
//!
//! ```rust
//! use nanoshell::registry::{Descriptor, Registry};
//! use nanoshell::session::Shell;
//!
//! fn reboot(_argc: usize, _argv: &[&str]) -> i32 {
//!     // signal the supervisor here
//!     0
//! }
//!
//! static TABLE: &[Descriptor] = &[
//!     Descriptor::command("reboot", "Restart the device", reboot),
//! ];
//!
//! fn uart_write(data: &[u8]) -> usize {
//!     // push bytes at the transport here
//!     data.len()
//! }
//!
//! let mut shell = Shell::new(Registry::new(TABLE));
//! shell.set_output_function(uart_write);
//! shell.write_prompt();
//!
//! // from the receive path, one byte or many at a time:
//! shell.input(b"reboot\r");
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt logging support for embedded debugging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Uniform error type for marshalling and dispatch failures.
pub mod error;

/// Fixed-capacity ring of previously entered lines.
pub mod history;

/// Leveled log broadcasting and hex dump rendering.
pub mod logging;

/// Token-to-typed-value marshalling for signature-typed handlers.
pub mod marshal;

/// Static descriptor tables for commands, variables, keys and users.
pub mod registry;

/// The live shell session: input state machine and dispatcher.
pub mod session;

/// Line splitting with quote and escape awareness.
pub mod token;

pub use error::Error;
pub use registry::{Descriptor, Registry};
pub use session::Shell;
