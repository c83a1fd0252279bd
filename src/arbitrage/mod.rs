pub mod bundle;
pub mod detector;
pub mod ranker;
pub mod sizer;

pub use bundle::{compute_economics, encode_payload, BundleBuilder};
pub use detector::{find_crossed_pairs, CrossingDetector};
pub use ranker::{best_for_token, rank_opportunities};
pub use sizer::VolumeSizer;
