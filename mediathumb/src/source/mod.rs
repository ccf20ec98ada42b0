//! Source acquisition: decoders, cloud fetchers and the load ladder.

mod cloud;
mod decoder;
mod loader;

pub use cloud::{CloudError, CloudFetcher, MirrorDirFetcher, NoCloud};
pub use decoder::{apply_orientation, DecodeError, ImageCrateDecoder, ImageDecoder};
pub use loader::{LoadError, LoadLadder, LoadStrategy, LoadedSource, SourceLoader};
