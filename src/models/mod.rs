pub mod enums;
pub mod facility;
pub mod patient;

pub use enums::*;
pub use facility::*;
pub use patient::*;
