mod track;

pub use track::{TrackSnapshot, md5_hex, synthesize_identity};
