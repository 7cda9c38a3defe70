pub mod clock;
pub mod html;
pub mod jwt;
