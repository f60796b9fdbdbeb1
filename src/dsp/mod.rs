//! Signal-processing kernels shared by separation and emotion shaping.

pub mod denoise;
pub mod features;
pub mod stft;
pub mod stretch;

pub use denoise::SpectralGate;
pub use stft::{Spectrum, Stft};
pub use stretch::{pitch_shift, time_stretch};
