pub mod check;
pub mod predict;
