pub mod color;
pub mod record;
