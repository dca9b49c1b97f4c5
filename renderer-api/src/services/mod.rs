//! Operations grouped by the service that carries them

pub mod application;
pub mod av_transport;
pub mod rendering_control;

pub use av_transport::TransportState;
