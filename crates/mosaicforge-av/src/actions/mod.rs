//! ffmpeg invocations used by the video pipeline.
//!
//! - Frame extraction into the raw-frame cache
//! - Audio track extraction
//! - Reassembly of transformed frames into a video

mod assemble;
mod extract;

pub use assemble::{reassemble, reassemble_command, ReassembleSettings};
pub use extract::{extract_audio, extract_audio_command, extract_frames, extract_frames_command};
