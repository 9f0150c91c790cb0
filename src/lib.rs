pub mod dec;
pub mod error;
pub mod frame;
pub mod player;
pub mod sink;
pub mod source;

mod audio;
mod chunk;
mod clock;
mod codebook;
mod ring;
mod slots;
mod video;
