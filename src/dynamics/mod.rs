pub mod decoherence;
pub mod dynamic_routines;
pub mod hopping;
pub mod rescaling;
pub mod schroedinger_integration;
pub mod simulation;
