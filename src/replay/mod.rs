// Replay prevention: single-use gate over token ids, with bounded size and periodic eviction.

pub mod guard;

pub use guard::ReplayGuard;
