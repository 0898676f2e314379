pub mod outlier;
pub mod run;
