pub mod bullet;
pub mod job;
pub mod skill;
