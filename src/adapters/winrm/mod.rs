//! WinRM remote-execution transport.
//!
//! Runs a fixed registry get/set/delete pipeline on the target host through a
//! WS-Management shell session: create shell, run one command, receive the
//! output streams, delete the shell. `protocol` builds and parses the SOAP
//! exchanges; `client` drives them over HTTP.

pub mod client;
pub mod protocol;

pub use client::WinRmTransport;
