pub mod card;
pub mod db;
pub mod due;
pub mod review;
