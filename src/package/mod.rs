pub mod playlist;
pub mod segments;
