pub mod info;
pub mod score;

mod util;
