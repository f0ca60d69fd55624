/// The growable staging buffer.
pub mod buf;

/// Utility I/O functions feeding a stage buffer from an async source.
pub mod io;
