pub mod constant_folding;
pub mod gvn;
pub mod simplify_impl;
