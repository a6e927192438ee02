pub mod controller;
pub mod pipeline;
pub mod playback;
pub mod reader;
pub mod shared;
pub mod signals;
pub mod supervisor;
pub mod writer_task;
