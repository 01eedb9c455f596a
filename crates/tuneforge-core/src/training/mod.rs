//! Training collaborators.

mod command_trainer;

pub use command_trainer::CommandTrainer;
