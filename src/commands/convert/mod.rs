mod aggregates;
mod checks;
mod findings;
mod normalize;
mod run;
mod showcase;

pub use run::run;
