pub mod health;
pub mod repo;
pub mod run;
