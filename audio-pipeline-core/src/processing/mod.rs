pub mod capture_buffer;
pub mod pcm;
pub mod playback_buffers;
pub mod wav_format;
