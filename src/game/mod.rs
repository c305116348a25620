pub mod autoplay;
pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod note;
pub mod session;
pub mod timing;
pub mod timing_stats;
