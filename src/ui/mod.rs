mod draw;
pub mod style;

pub use draw::draw;
