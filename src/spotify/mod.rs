pub mod client;

pub use client::{parse_playlist_ref, SpotifyClient};
