pub mod memory;
pub mod naming;
pub mod open_file;
pub mod wav_reader;
pub mod wav_writer;
