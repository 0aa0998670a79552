pub(crate) mod encoder;
pub(crate) mod ffmpeg;
pub(crate) mod gif;
pub(crate) mod sink;
