pub mod batch;
pub mod clock;
pub mod decode;
pub mod minifb_display;
