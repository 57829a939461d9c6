pub mod dispatch;
pub mod drivers;
pub mod fees;
pub mod geo;
pub mod lifecycle;
pub mod monitor;
pub mod orders;
pub mod tracking;
pub mod verification;
