// src/io/serial/mod.rs
//
// Serial line input.
//
// Features:
// - Line framing of arbitrarily-chunked bytes (any platform)
// - Serial port byte source (desktop platforms)

pub mod framer;
#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub mod reader;

pub use framer::{Line, LineFramer, Lines, RawBuffer, TextEncoding, LINE_TERMINATOR};

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub use reader::{SerialConfig, SerialSource};
