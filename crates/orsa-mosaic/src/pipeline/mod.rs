//! Registration pipeline.
//!
//! Stages: grayscale conversion -> SIFT on both images -> ratio matching ->
//! ORSA -> least-squares refinement -> match rendering -> intersection framing
//! -> warping and mosaicking. Building blocks live in `crate::features`,
//! `crate::homography`, `crate::warp` and `crate::render`; this layer owns
//! the call order and the data flow between them.

mod result;
mod run;

pub use result::{Registration, RegistrationStats};

pub(crate) use run::register_rgb;
