//! Remote endpoints: text completion and image generation

mod chat;
mod image;

pub use chat::{ChatCompletion, PollinationsChat, parse_reply};
pub use image::{
    HttpImageSource, ImageOptions, ImageRequest, ImageSource, SEED_RANGE, random_seed,
};
