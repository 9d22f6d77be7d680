pub mod cors;

pub use cors::mw_allow_any_origin;
