pub mod run;
pub mod scale;
pub mod validate;
